use crate::{
    Algorithm, agents::Agent, env_pools::EnvPool, utils::rollout_buffer::RolloutBuffer,
};
use candle_core::Result;
use tracing::info;

macro_rules! break_on_hook_res {
    ($hook_res:expr) => {
        if $hook_res {
            break;
        }
    };
}

/// When a training run is over: after a fixed number of rollouts, or once
/// the collected env steps reach a total.
#[derive(Debug, Clone, Copy)]
pub enum LearningSchedule {
    RolloutBound {
        total_rollouts: usize,
        current_rollout: usize,
    },
    TotalStepBound {
        total_steps: usize,
        current_step: usize,
    },
}

impl LearningSchedule {
    pub fn total_step_bound(total_steps: usize) -> Self {
        Self::TotalStepBound {
            total_steps,
            current_step: 0,
        }
    }

    pub fn rollout_bound(total_rollouts: usize) -> Self {
        Self::RolloutBound {
            total_rollouts,
            current_rollout: 0,
        }
    }
}

pub trait OnPolicyHooks {
    /// Returning `true` from a hook stops the training loop.
    fn init_hook(&mut self) -> bool;

    fn post_rollout_hook(&mut self, rollouts: &mut [RolloutBuffer]) -> bool;

    fn post_training_hook(&mut self) -> bool;

    fn shutdown_hook(&mut self) -> Result<()>;
}

/// Tracks the learning schedule and logs per-rollout episode statistics.
pub struct DefaultOnPolicyHooks {
    rollout_idx: usize,
    learning_schedule: LearningSchedule,
}

impl DefaultOnPolicyHooks {
    pub fn new(learning_schedule: LearningSchedule) -> Self {
        Self {
            rollout_idx: 0,
            learning_schedule,
        }
    }
}

impl OnPolicyHooks for DefaultOnPolicyHooks {
    fn init_hook(&mut self) -> bool {
        false
    }

    fn post_rollout_hook(&mut self, rollouts: &mut [RolloutBuffer]) -> bool {
        let total_reward = rollouts.iter().map(|rb| rb.total_reward()).sum::<f32>();
        let episodes = rollouts.iter().map(|rb| rb.episodes()).sum::<usize>();
        info!(
            rollout = self.rollout_idx,
            episodes,
            total_reward,
            avg_episode_reward = total_reward / episodes.max(1) as f32,
            "rollout collected"
        );
        self.rollout_idx += 1;
        match &mut self.learning_schedule {
            LearningSchedule::RolloutBound {
                total_rollouts,
                current_rollout,
            } => {
                *current_rollout += 1;
                current_rollout >= total_rollouts
            }
            LearningSchedule::TotalStepBound {
                total_steps,
                current_step,
            } => {
                let rollout_steps: usize = rollouts.iter().map(|rb| rb.len()).sum();
                *current_step += rollout_steps;
                current_step >= total_steps
            }
        }
    }

    fn post_training_hook(&mut self) -> bool {
        false
    }

    fn shutdown_hook(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct OnPolicyAlgorithm<S: EnvPool, A: Agent, H: OnPolicyHooks> {
    pub env_pool: S,
    pub agent: A,
    pub hooks: H,
}

impl<S: EnvPool, A: Agent, H: OnPolicyHooks> Algorithm for OnPolicyAlgorithm<S, A, H> {
    fn train(&mut self) -> Result<()> {
        if self.hooks.init_hook() {
            return Ok(());
        }
        loop {
            // rollout phase
            let distribution = self.agent.distribution();
            let mut rollouts = self.env_pool.collect_rollouts(distribution)?;
            break_on_hook_res!(self.hooks.post_rollout_hook(&mut rollouts));

            // learning phase
            self.agent.learn(rollouts)?;
            break_on_hook_res!(self.hooks.post_training_hook());
        }
        self.hooks.shutdown_hook()
    }
}
