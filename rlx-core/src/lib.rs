pub mod agents;
pub mod distributions;
pub mod env;
pub mod env_builder;
pub mod env_pools;
pub mod network;
pub mod on_policy_algorithm;
pub mod policies;
pub mod rng;
pub mod tensors;
pub mod utils;

use candle_core::Result;

/// Anything that can be trained to completion by a single call.
pub trait Algorithm {
    fn train(&mut self) -> Result<()>;
}
