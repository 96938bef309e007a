pub mod categorical;
pub mod diag_gaussian;

use candle_core::{Result, Tensor};
use categorical::CategoricalDistribution;
use diag_gaussian::DiagGaussianDistribution;
use enum_dispatch::enum_dispatch;

/// An action distribution parameterized by a policy network. `Sync` is
/// required so that rollout workers can share one by reference.
#[enum_dispatch]
pub trait Distribution: Sync {
    /// Samples an action for a batch-of-one observation. Returns the action
    /// together with its log probability as a scalar tensor.
    fn get_action(&self, observation: &Tensor) -> Result<(Tensor, Tensor)>;

    /// Log probabilities of `actions` under the states' distributions.
    fn log_probs(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor>;

    /// Per-state entropy of the distribution.
    fn entropy(&self, states: &Tensor) -> Result<Tensor>;
}

#[enum_dispatch(Distribution)]
#[derive(Debug)]
pub enum DistributionKind {
    Categorical(CategoricalDistribution),
    DiagGaussian(DiagGaussianDistribution),
}
