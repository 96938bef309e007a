use crate::builders::policies::{DistributionSpec, PolicyBuilder};
use candle_core::{Device, Result};
use rlx_agents::ppo::{PPO, hooks::EmptyPpoHooks};
use rlx_core::env::EnvironmentDescription;

pub struct PPOBuilder {
    pub distribution_spec: DistributionSpec,
    pub policy_builder: PolicyBuilder,
    pub clip_range: f32,
    pub gamma: f32,
    pub lambda: f32,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub ent_coef: f32,
    pub vf_coef: f32,
    pub normalize_advantage: bool,
    pub target_kl: Option<f32>,
}

impl Default for PPOBuilder {
    fn default() -> Self {
        PPOBuilder {
            distribution_spec: DistributionSpec::Auto {
                hidden_layers: vec![64, 64],
            },
            policy_builder: PolicyBuilder::default(),
            clip_range: 0.2,
            gamma: 0.99,
            lambda: 0.95,
            batch_size: 64,
            n_epochs: 10,
            ent_coef: 0.,
            vf_coef: 0.5,
            normalize_advantage: false,
            target_kl: None,
        }
    }
}

impl PPOBuilder {
    pub fn build(
        &self,
        device: &Device,
        env_description: &EnvironmentDescription,
    ) -> Result<PPO> {
        let policy =
            self.policy_builder
                .build_policy(&self.distribution_spec, env_description, device)?;
        Ok(PPO {
            policy,
            hooks: Box::new(EmptyPpoHooks),
            clip_range: self.clip_range,
            gamma: self.gamma,
            lambda: self.lambda,
            batch_size: self.batch_size,
            n_epochs: self.n_epochs,
            ent_coef: self.ent_coef,
            vf_coef: self.vf_coef,
            normalize_advantage: self.normalize_advantage,
            target_kl: self.target_kl,
            device: device.clone(),
        })
    }
}
