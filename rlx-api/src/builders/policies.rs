use candle_core::{DType, Device, Result};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rlx_core::{
    distributions::{
        DistributionKind, categorical::CategoricalDistribution,
        diag_gaussian::DiagGaussianDistribution,
    },
    env::{EnvironmentDescription, Space},
    network::build_mlp,
    policies::{
        ClippedOptimizer, PolicyKind, actor_critic::ActorCritic,
        split_actor_critic::SplitActorCritic,
    },
};

pub enum PolicyType {
    /// Actor and critic share one optimizer and variable store.
    Shared {
        value_layers: Vec<usize>,
        max_grad_norm: Option<f32>,
    },
    /// Actor and critic with their own optimizers.
    Split {
        value_layers: Vec<usize>,
        policy_max_grad_norm: Option<f32>,
        value_max_grad_norm: Option<f32>,
    },
}

pub enum DistributionSpec {
    /// Categorical for discrete action spaces, diagonal Gaussian otherwise.
    Auto { hidden_layers: Vec<usize> },
    Categorical { hidden_layers: Vec<usize> },
    DiagGaussian { hidden_layers: Vec<usize> },
}

impl DistributionSpec {
    fn build_categorical(
        vb: &VarBuilder,
        env_description: &EnvironmentDescription,
        device: &Device,
        hidden_layers: &[usize],
    ) -> Result<DistributionKind> {
        let action_size = env_description.action_size();
        let observation_size = env_description.observation_size();
        let layers = [hidden_layers, &[action_size]].concat();
        let distr = CategoricalDistribution::build(
            observation_size,
            action_size,
            &layers,
            vb,
            device.clone(),
            "policy",
        )?;
        Ok(DistributionKind::Categorical(distr))
    }

    fn build_diag_gaussian(
        vb: &VarBuilder,
        env_description: &EnvironmentDescription,
        hidden_layers: &[usize],
    ) -> Result<DistributionKind> {
        let action_size = env_description.action_size();
        let observation_size = env_description.observation_size();
        let layers = [hidden_layers, &[action_size]].concat();
        let distr =
            DiagGaussianDistribution::build(observation_size, action_size, &layers, vb, "policy")?;
        Ok(DistributionKind::DiagGaussian(distr))
    }

    pub fn build(
        &self,
        vb: &VarBuilder,
        device: &Device,
        env_description: &EnvironmentDescription,
    ) -> Result<DistributionKind> {
        match self {
            Self::Categorical { hidden_layers } => {
                Self::build_categorical(vb, env_description, device, hidden_layers)
            }
            Self::DiagGaussian { hidden_layers } => {
                Self::build_diag_gaussian(vb, env_description, hidden_layers)
            }
            Self::Auto { hidden_layers } => match env_description.action_space {
                Space::Discrete(..) => {
                    Self::build_categorical(vb, env_description, device, hidden_layers)
                }
                Space::Continuous { .. } => {
                    Self::build_diag_gaussian(vb, env_description, hidden_layers)
                }
            },
        }
    }
}

pub struct PolicyBuilder {
    pub policy_type: PolicyType,
    pub learning_rate: f64,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self {
            policy_type: PolicyType::Shared {
                value_layers: vec![64, 64],
                max_grad_norm: Some(0.5),
            },
            learning_rate: 3e-4,
        }
    }
}

impl PolicyBuilder {
    fn optimizer_params(&self) -> ParamsAdamW {
        ParamsAdamW {
            lr: self.learning_rate,
            weight_decay: 0.,
            ..Default::default()
        }
    }

    pub fn build_policy(
        &self,
        distribution_spec: &DistributionSpec,
        env_description: &EnvironmentDescription,
        device: &Device,
    ) -> Result<PolicyKind> {
        let input_size = env_description.observation_size();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let distribution = distribution_spec.build(&vb, device, env_description)?;
        match &self.policy_type {
            PolicyType::Shared {
                value_layers,
                max_grad_norm,
            } => {
                let value_layers = [&value_layers[..], &[1]].concat();
                let value_net = build_mlp(input_size, &value_layers, &vb, "value")?;
                let optimizer = AdamW::new(varmap.all_vars(), self.optimizer_params())?;
                let optimizer = ClippedOptimizer::new(optimizer, *max_grad_norm, varmap);
                Ok(PolicyKind::ActorCritic(ActorCritic::new(
                    distribution,
                    value_net,
                    optimizer,
                )))
            }
            PolicyType::Split {
                value_layers,
                policy_max_grad_norm,
                value_max_grad_norm,
            } => {
                let critic_varmap = VarMap::new();
                let critic_vb = VarBuilder::from_varmap(&critic_varmap, DType::F32, device);
                let value_layers = [&value_layers[..], &[1]].concat();
                let value_net = build_mlp(input_size, &value_layers, &critic_vb, "value")?;
                let policy_optimizer = AdamW::new(varmap.all_vars(), self.optimizer_params())?;
                let value_optimizer = AdamW::new(critic_varmap.all_vars(), self.optimizer_params())?;
                let policy_optimizer =
                    ClippedOptimizer::new(policy_optimizer, *policy_max_grad_norm, varmap);
                let value_optimizer =
                    ClippedOptimizer::new(value_optimizer, *value_max_grad_norm, critic_varmap);
                Ok(PolicyKind::Split(SplitActorCritic {
                    distribution,
                    value_net,
                    policy_optimizer,
                    value_optimizer,
                }))
            }
        }
    }
}
