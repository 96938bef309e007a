use crate::{distributions::Distribution, utils::rollout_buffer::RolloutBuffer};
use candle_core::Result;

pub trait Agent {
    type Dist: Distribution;

    /// The distribution rollouts are sampled from.
    fn distribution(&self) -> &Self::Dist;

    /// Consumes the collected rollouts and updates the policy.
    fn learn(&mut self, rollouts: Vec<RolloutBuffer>) -> Result<()>;
}
