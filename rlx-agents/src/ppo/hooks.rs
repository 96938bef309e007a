use candle_core::{Result, Tensor};
use rlx_core::{
    policies::PolicyKind,
    tensors::{Logp, PolicyLoss, ValueLoss},
    utils::rollout_buffer::{RolloutBatch, RolloutBuffer},
};

pub enum HookResult {
    Continue,
    Break,
}

/// Per-batch quantities handed to the batch hook before the optimizer step.
pub struct PpoBatchData {
    pub logp: Logp,
    pub ratio: Tensor,
    pub approx_kl: f32,
}

/// Instrumentation points of one `learn` call. Hooks default to no-ops;
/// returning `Break` abandons the rest of the learning phase.
pub trait PpoHooks {
    fn before_learning_hook(
        &mut self,
        _policy: &mut PolicyKind,
        _rollouts: &mut Vec<RolloutBuffer>,
    ) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }

    fn epoch_hook(&mut self, _policy: &mut PolicyKind, _epoch: usize) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }

    fn batch_hook(
        &mut self,
        _policy: &mut PolicyKind,
        _batch: &RolloutBatch,
        _policy_loss: &mut PolicyLoss,
        _value_loss: &mut ValueLoss,
        _data: &PpoBatchData,
    ) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }
}

pub struct EmptyPpoHooks;

impl PpoHooks for EmptyPpoHooks {}
