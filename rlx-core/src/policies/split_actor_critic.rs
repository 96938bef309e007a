use super::{ClippedOptimizer, Policy, ValueFunction};
use crate::distributions::DistributionKind;
use crate::network::MlpNet;
use crate::tensors::{PolicyLoss, ValueLoss};
use candle_core::{Result, Tensor};
use candle_nn::Module;

/// Actor and critic with separate variable stores and optimizers, so the
/// two can run with different clipping or learning rates.
#[derive(Debug)]
pub struct SplitActorCritic {
    pub distribution: DistributionKind,
    pub value_net: MlpNet,
    pub policy_optimizer: ClippedOptimizer,
    pub value_optimizer: ClippedOptimizer,
}

impl SplitActorCritic {
    pub fn learning_rate(&self) -> f64 {
        self.policy_optimizer.learning_rate()
    }

    pub fn policy_optimizer(&self) -> &ClippedOptimizer {
        &self.policy_optimizer
    }

    pub fn value_optimizer(&self) -> &ClippedOptimizer {
        &self.value_optimizer
    }
}

impl Policy for SplitActorCritic {
    fn distribution(&self) -> &DistributionKind {
        &self.distribution
    }

    fn update(&mut self, policy_loss: PolicyLoss, value_loss: ValueLoss) -> Result<()> {
        self.policy_optimizer.backward_step(&policy_loss)?;
        self.value_optimizer.backward_step(&value_loss)
    }
}

impl ValueFunction for SplitActorCritic {
    fn calculate_values(&self, observation: &Tensor) -> Result<Tensor> {
        self.value_net.forward(observation)?.squeeze(1)
    }
}
