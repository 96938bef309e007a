pub mod hooks;

use candle_core::{Device, Result, Tensor};
use hooks::{EmptyPpoHooks, HookResult, PpoBatchData, PpoHooks};
use rlx_core::{
    agents::Agent,
    distributions::{Distribution, DistributionKind},
    policies::{Policy, PolicyKind, ValueFunction},
    tensors::{Logp, PolicyLoss, ValueLoss},
    utils::rollout_buffer::{RolloutBatch, RolloutBatchIterator, RolloutBuffer},
};

macro_rules! process_hook_result {
    ($hook_res:expr) => {
        match $hook_res? {
            HookResult::Continue => {}
            HookResult::Break => return Ok(()),
        }
    };
}

/// Clipped-surrogate PPO over an actor-critic policy. One `learn` call runs
/// `n_epochs` passes of shuffled minibatches over the collected rollouts.
pub struct PPO {
    pub policy: PolicyKind,
    pub hooks: Box<dyn PpoHooks>,
    pub clip_range: f32,
    pub gamma: f32,
    pub lambda: f32,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub ent_coef: f32,
    pub vf_coef: f32,
    pub normalize_advantage: bool,
    pub target_kl: Option<f32>,
    pub device: Device,
}

impl PPO {
    pub fn with_hooks(mut self, hooks: Box<dyn PpoHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    fn normalize(advantages: &Tensor) -> Result<Tensor> {
        let mean = advantages.mean_all()?;
        let centered = advantages.broadcast_sub(&mean)?;
        let std = centered.sqr()?.mean_all()?.sqrt()?;
        centered.broadcast_div(&(std + 1e-8)?)
    }

    fn learning_loop(
        &mut self,
        hooks: &mut dyn PpoHooks,
        rollouts: &mut Vec<RolloutBuffer>,
    ) -> Result<()> {
        process_hook_result!(hooks.before_learning_hook(&mut self.policy, rollouts));
        for epoch in 0..self.n_epochs {
            let mut batches =
                RolloutBatchIterator::new(rollouts, self.batch_size, self.device.clone());
            while let Some(batch) = batches.next() {
                match self.train_on_batch(hooks, batch?)? {
                    HookResult::Continue => {}
                    HookResult::Break => return Ok(()),
                }
            }
            process_hook_result!(hooks.epoch_hook(&mut self.policy, epoch));
        }
        Ok(())
    }

    /// Runs one optimizer step. Returns `Break` when the batch hook or the
    /// KL guard asks to abandon the learning phase.
    fn train_on_batch(
        &mut self,
        hooks: &mut dyn PpoHooks,
        batch: RolloutBatch,
    ) -> Result<HookResult> {
        let advantages = if self.normalize_advantage {
            Self::normalize(&batch.advantages)?
        } else {
            batch.advantages.clone()
        };
        let logp = self
            .policy
            .distribution()
            .log_probs(&batch.observations, &batch.actions)?;
        let log_ratio = (&logp - &batch.logp_old)?;
        let ratio = log_ratio.exp()?;
        let approx_kl = ((ratio.detach() - 1f64)? - &log_ratio.detach())?
            .mean_all()?
            .to_scalar::<f32>()?;
        if let Some(target_kl) = self.target_kl {
            if approx_kl > 1.5 * target_kl {
                return Ok(HookResult::Break);
            }
        }
        let clipped =
            (ratio.clamp(1. - self.clip_range, 1. + self.clip_range)? * advantages.clone())?;
        let surrogate = Tensor::minimum(&(&ratio * &advantages)?, &clipped)?;
        let entropy = self
            .policy
            .distribution()
            .entropy(&batch.observations)?
            .mean_all()?;
        let policy_loss = (surrogate.neg()?.mean_all()? - (entropy * self.ent_coef as f64)?)?;
        let values = self.policy.calculate_values(&batch.observations)?;
        let value_loss = (batch.returns.sub(&values)?.sqr()?.mean_all()? * self.vf_coef as f64)?;

        let mut policy_loss = PolicyLoss(policy_loss);
        let mut value_loss = ValueLoss(value_loss);
        let data = PpoBatchData {
            logp: Logp(logp),
            ratio,
            approx_kl,
        };
        let hook_result = hooks.batch_hook(
            &mut self.policy,
            &batch,
            &mut policy_loss,
            &mut value_loss,
            &data,
        )?;
        self.policy.update(policy_loss, value_loss)?;
        Ok(hook_result)
    }
}

impl Agent for PPO {
    type Dist = DistributionKind;

    fn distribution(&self) -> &Self::Dist {
        self.policy.distribution()
    }

    fn learn(&mut self, mut rollouts: Vec<RolloutBuffer>) -> Result<()> {
        for rb in rollouts.iter_mut() {
            rb.compute_advantages_and_returns(&self.policy, self.gamma, self.lambda)?;
        }
        // the hooks borrow the policy mutably, so they are swapped out for
        // the duration of the learning phase
        let mut hooks = std::mem::replace(&mut self.hooks, Box::new(EmptyPpoHooks));
        let res = self.learning_loop(hooks.as_mut(), &mut rollouts);
        self.hooks = hooks;
        res
    }
}
