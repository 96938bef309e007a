use crate::builders::{env_pool::VecPoolType, ppo::PPOBuilder};
use candle_core::{Device, Result};
use rlx_agents::ppo::PPO;
use rlx_core::{
    env::RolloutMode,
    env_builder::EnvBuilder,
    env_pools::{EnvPool, VecPoolKind},
    on_policy_algorithm::{DefaultOnPolicyHooks, LearningSchedule, OnPolicyAlgorithm},
};

/// Assembles pool, agent and schedule the way stable-baselines'
/// `PPO("MlpPolicy", env, ...)` constructor does.
pub struct OnPolicyAlgorithmBuilder {
    pub device: Device,
    pub pool_type: VecPoolType,
    pub rollout_mode: RolloutMode,
    pub learning_schedule: LearningSchedule,
    pub ppo: PPOBuilder,
}

impl Default for OnPolicyAlgorithmBuilder {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            pool_type: VecPoolType::default(),
            rollout_mode: RolloutMode::StepBound { n_steps: 2048 },
            learning_schedule: LearningSchedule::total_step_bound(100_000),
            ppo: PPOBuilder::default(),
        }
    }
}

impl OnPolicyAlgorithmBuilder {
    pub fn ppo() -> Self {
        Self::default()
    }

    pub fn set_device(&mut self, device: Device) {
        self.device = device;
    }

    pub fn set_learning_schedule(&mut self, learning_schedule: LearningSchedule) {
        self.learning_schedule = learning_schedule;
    }

    pub fn set_rollout_mode(&mut self, rollout_mode: RolloutMode) {
        self.rollout_mode = rollout_mode;
    }

    pub fn build<EB: EnvBuilder>(
        self,
        env_builder: &EB,
        n_envs: usize,
    ) -> Result<OnPolicyAlgorithm<VecPoolKind<EB::Env>, PPO, DefaultOnPolicyHooks>>
    where
        EB::Env: Send + 'static,
    {
        let env_pool =
            self.pool_type
                .build(&self.device, env_builder, n_envs, self.rollout_mode)?;
        let env_description = env_pool.env_description();
        let agent = self.ppo.build(&self.device, &env_description)?;
        let hooks = DefaultOnPolicyHooks::new(self.learning_schedule);
        Ok(OnPolicyAlgorithm {
            env_pool,
            agent,
            hooks,
        })
    }
}
