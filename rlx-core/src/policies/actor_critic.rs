use super::{ClippedOptimizer, Policy, ValueFunction};
use crate::distributions::DistributionKind;
use crate::network::MlpNet;
use crate::tensors::{PolicyLoss, ValueLoss};
use candle_core::{Result, Tensor};
use candle_nn::Module;

/// Actor and critic trained by a single optimizer over a shared variable
/// store. The losses are summed before the backward pass.
#[derive(Debug)]
pub struct ActorCritic {
    distribution: DistributionKind,
    value_net: MlpNet,
    optimizer: ClippedOptimizer,
}

impl ActorCritic {
    pub fn new(
        distribution: DistributionKind,
        value_net: MlpNet,
        optimizer: ClippedOptimizer,
    ) -> Self {
        Self {
            distribution,
            value_net,
            optimizer,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn optimizer(&self) -> &ClippedOptimizer {
        &self.optimizer
    }
}

impl Policy for ActorCritic {
    fn distribution(&self) -> &DistributionKind {
        &self.distribution
    }

    fn update(&mut self, policy_loss: PolicyLoss, value_loss: ValueLoss) -> Result<()> {
        let loss = policy_loss.add(&value_loss)?;
        self.optimizer.backward_step(&loss)
    }
}

impl ValueFunction for ActorCritic {
    fn calculate_values(&self, observation: &Tensor) -> Result<Tensor> {
        self.value_net.forward(observation)?.squeeze(1)
    }
}
