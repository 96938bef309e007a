pub mod actor_critic;
pub mod split_actor_critic;

use crate::distributions::DistributionKind;
use crate::tensors::{PolicyLoss, ValueLoss};
use actor_critic::ActorCritic;
use candle_core::{Result, Tensor, backprop::GradStore};
use candle_nn::{AdamW, Optimizer, VarMap};
use split_actor_critic::SplitActorCritic;
use std::fmt::Debug;
use std::path::Path;

/// Estimates state values for advantage and return computation.
pub trait ValueFunction {
    fn calculate_values(&self, observation: &Tensor) -> Result<Tensor>;
}

pub trait Policy {
    fn distribution(&self) -> &DistributionKind;

    /// Applies one optimizer step for the given losses.
    fn update(&mut self, policy_loss: PolicyLoss, value_loss: ValueLoss) -> Result<()>;
}

pub trait PolicyWithValueFunction: Policy + ValueFunction {}

impl<T: Policy + ValueFunction> PolicyWithValueFunction for T {}

/// Scales the gradients so that their global norm does not exceed
/// `max_norm`.
fn clip_grad(loss: &Tensor, varmap: &VarMap, max_norm: f32) -> Result<GradStore> {
    let mut grad_store = loss.backward()?;
    let all_vars = varmap.all_vars();
    let mut total_norm_squared = 0f32;
    let mut clippable = vec![];
    for var in all_vars.iter() {
        if let Some(grad) = grad_store.get_id(var.id()) {
            total_norm_squared += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
            clippable.push((var, grad.clone()));
        }
    }
    let total_norm = total_norm_squared.sqrt();
    if total_norm > max_norm {
        let clip_coef = max_norm / (total_norm + 1e-6);
        for (var, grad) in clippable {
            let clipped = (grad * clip_coef as f64)?;
            grad_store.insert(var.as_tensor(), clipped);
        }
    }
    Ok(grad_store)
}

/// AdamW plus optional clipping by global gradient norm.
pub struct ClippedOptimizer {
    optimizer: AdamW,
    max_grad_norm: Option<f32>,
    varmap: VarMap,
}

impl Debug for ClippedOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClippedOptimizer")
            .field("optimizer", &self.optimizer)
            .field("max_grad_norm", &self.max_grad_norm)
            .finish()
    }
}

impl ClippedOptimizer {
    pub fn new(optimizer: AdamW, max_grad_norm: Option<f32>, varmap: VarMap) -> Self {
        Self {
            optimizer,
            max_grad_norm,
            varmap,
        }
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = if let Some(max_norm) = self.max_grad_norm {
            clip_grad(loss, &self.varmap, max_norm)?
        } else {
            loss.backward()?
        };
        self.optimizer.step(&grads)?;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

#[derive(Debug)]
pub enum PolicyKind {
    ActorCritic(ActorCritic),
    Split(SplitActorCritic),
}

impl PolicyKind {
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::ActorCritic(p) => p.learning_rate(),
            Self::Split(p) => p.learning_rate(),
        }
    }

    /// Writes the policy weights as safetensors, one file per variable
    /// store.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            Self::ActorCritic(p) => p.optimizer().varmap().save(path),
            Self::Split(p) => {
                let path = path.as_ref();
                p.policy_optimizer().varmap().save(path)?;
                let value_path = path.with_extension("value.safetensors");
                p.value_optimizer().varmap().save(value_path)
            }
        }
    }
}

impl Policy for PolicyKind {
    fn distribution(&self) -> &DistributionKind {
        match self {
            Self::ActorCritic(p) => p.distribution(),
            Self::Split(p) => p.distribution(),
        }
    }

    fn update(&mut self, policy_loss: PolicyLoss, value_loss: ValueLoss) -> Result<()> {
        match self {
            Self::ActorCritic(p) => p.update(policy_loss, value_loss),
            Self::Split(p) => p.update(policy_loss, value_loss),
        }
    }
}

impl ValueFunction for PolicyKind {
    fn calculate_values(&self, observation: &Tensor) -> Result<Tensor> {
        match self {
            Self::ActorCritic(p) => p.calculate_values(observation),
            Self::Split(p) => p.calculate_values(observation),
        }
    }
}
