use crate::policies::ValueFunction;
use crate::rng;
use candle_core::{Device, Result, Tensor};
use rand::seq::SliceRandom;

/// Transitions collected from a single environment. After a `StepBound`
/// rollout of `n` steps the buffer holds `n` transitions and `n + 1` states;
/// the extra state bootstraps the value of the final transition.
#[derive(Debug, Default, Clone)]
pub struct RolloutBuffer {
    pub states: Vec<Tensor>,
    pub actions: Vec<Tensor>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub logps: Vec<f32>,
    pub advantages: Option<Vec<f32>>,
    pub returns: Option<Vec<f32>>,
}

impl RolloutBuffer {
    pub fn push_step(&mut self, state: Tensor, action: Tensor, reward: f32, done: bool, logp: f32) {
        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.dones.push(done);
        self.logps.push(logp);
    }

    pub fn push_final_state(&mut self, state: Tensor) {
        self.states.push(state);
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.logps.clear();
        self.advantages = None;
        self.returns = None;
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }

    pub fn episodes(&self) -> usize {
        self.dones.iter().filter(|done| **done).count()
    }

    /// Runs the critic over the stored states and fills in GAE advantages
    /// and returns.
    pub fn compute_advantages_and_returns<P: ValueFunction + ?Sized>(
        &mut self,
        value_fn: &P,
        gamma: f32,
        lambda: f32,
    ) -> Result<()> {
        let states = Tensor::stack(&self.states, 0)?;
        let values: Vec<f32> = value_fn.calculate_values(&states)?.to_vec1()?;
        let (advantages, returns) = gae(&self.rewards, &self.dones, &values, gamma, lambda);
        self.advantages = Some(advantages);
        self.returns = Some(returns);
        Ok(())
    }

    pub fn normalize_advantages(&mut self) {
        let Some(advantages) = self.advantages.as_mut() else {
            return;
        };
        let mean = advantages.iter().sum::<f32>() / advantages.len() as f32;
        let variance = advantages.iter().map(|x| (*x - mean).powi(2)).sum::<f32>()
            / advantages.len() as f32;
        let std = variance.sqrt() + 1e-8;
        for x in advantages.iter_mut() {
            *x = (*x - mean) / std;
        }
    }

    pub fn sample_point(&self, index: usize) -> (&Tensor, &Tensor, Option<f32>, Option<f32>, f32) {
        (
            &self.states[index],
            &self.actions[index],
            self.advantages.as_ref().map(|adv| adv[index]),
            self.returns.as_ref().map(|ret| ret[index]),
            self.logps[index],
        )
    }
}

/// Generalized advantage estimation. `values` must hold one entry per
/// transition plus the bootstrap value of the final state; a `done` cuts
/// both the bootstrap and the accumulated advantage.
pub fn gae(
    rewards: &[f32],
    dones: &[bool],
    values: &[f32],
    gamma: f32,
    lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let total_steps = rewards.len();
    debug_assert_eq!(values.len(), total_steps + 1);
    let mut advantages = vec![0f32; total_steps];
    let mut returns = vec![0f32; total_steps];
    let mut last_gae_lam = 0f32;
    for i in (0..total_steps).rev() {
        let next_non_terminal = if dones[i] {
            last_gae_lam = 0.;
            0f32
        } else {
            1.
        };
        let delta = rewards[i] + next_non_terminal * gamma * values[i + 1] - values[i];
        last_gae_lam = delta + next_non_terminal * gamma * lambda * last_gae_lam;
        advantages[i] = last_gae_lam;
        returns[i] = last_gae_lam + values[i];
    }
    (advantages, returns)
}

pub struct RolloutBatch {
    pub observations: Tensor,
    pub actions: Tensor,
    pub advantages: Tensor,
    pub returns: Tensor,
    pub logp_old: Tensor,
}

/// Iterates shuffled minibatches across all buffers of a rollout. A final
/// partial batch is dropped.
pub struct RolloutBatchIterator<'a> {
    rollouts: &'a [RolloutBuffer],
    indices: Vec<(usize, usize)>,
    current: usize,
    batch_size: usize,
    device: Device,
}

impl<'a> RolloutBatchIterator<'a> {
    pub fn new(rollouts: &'a [RolloutBuffer], batch_size: usize, device: Device) -> Self {
        let mut indices = (0..rollouts.len())
            .flat_map(|i| (0..rollouts[i].len()).map(move |j| (i, j)))
            .collect::<Vec<_>>();
        rng::with_rng(|rng| indices.shuffle(rng));
        Self {
            rollouts,
            indices,
            current: 0,
            batch_size,
            device,
        }
    }
}

impl Iterator for RolloutBatchIterator<'_> {
    type Item = Result<RolloutBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current + self.batch_size > self.indices.len() {
            return None;
        }
        let batch_indices = &self.indices[self.current..self.current + self.batch_size];
        self.current += self.batch_size;
        let mut states = vec![];
        let mut actions = vec![];
        let mut advantages = vec![];
        let mut returns = vec![];
        let mut logps = vec![];
        for (rollout_idx, idx) in batch_indices {
            let (state, action, advantage, ret, logp) =
                self.rollouts[*rollout_idx].sample_point(*idx);
            let (Some(advantage), Some(ret)) = (advantage, ret) else {
                return None;
            };
            states.push(state);
            actions.push(action);
            advantages.push(advantage);
            returns.push(ret);
            logps.push(logp);
        }
        let batch = (|| -> Result<RolloutBatch> {
            Ok(RolloutBatch {
                observations: Tensor::stack(&states, 0)?,
                actions: Tensor::stack(&actions, 0)?,
                advantages: Tensor::from_slice(&advantages, advantages.len(), &self.device)?,
                returns: Tensor::from_slice(&returns, returns.len(), &self.device)?,
                logp_old: Tensor::from_slice(&logps, logps.len(), &self.device)?,
            })
        })();
        Some(batch)
    }
}

#[cfg(test)]
mod test {
    use super::{RolloutBatchIterator, RolloutBuffer, gae};
    use candle_core::{Device, Result, Tensor};

    #[test]
    fn gae_without_episode_ends() {
        let rewards = [1f32, 1., 1.];
        let dones = [false, false, false];
        let values = [0.5f32, 0.5, 0.5, 0.5];
        let (gamma, lambda) = (0.9f32, 0.8);
        let (advantages, returns) = gae(&rewards, &dones, &values, gamma, lambda);
        // deltas are all 1 + 0.9 * 0.5 - 0.5 = 0.95
        let d = 0.95f32;
        let a2 = d;
        let a1 = d + gamma * lambda * a2;
        let a0 = d + gamma * lambda * a1;
        assert!((advantages[2] - a2).abs() < 1e-6);
        assert!((advantages[1] - a1).abs() < 1e-6);
        assert!((advantages[0] - a0).abs() < 1e-6);
        for (adv, ret) in advantages.iter().zip(returns.iter()) {
            assert!((ret - (adv + 0.5)).abs() < 1e-6);
        }
    }

    #[test]
    fn gae_stops_at_episode_boundary() {
        let rewards = [1f32, 1., 1.];
        let dones = [false, true, false];
        let values = [0.5f32, 0.5, 0.5, 0.5];
        let (gamma, lambda) = (0.9f32, 0.8);
        let (advantages, _) = gae(&rewards, &dones, &values, gamma, lambda);
        // the done at index 1 drops both the bootstrap and the carry
        let a1 = 1. - 0.5;
        let a2 = 1. + gamma * 0.5 - 0.5;
        assert!((advantages[1] - a1).abs() < 1e-6);
        assert!((advantages[2] - a2).abs() < 1e-6);
        assert!((advantages[0] - (0.95 + gamma * lambda * a1)).abs() < 1e-6);
    }

    #[test]
    fn normalized_advantages_have_zero_mean_unit_std() {
        let mut buffer = RolloutBuffer {
            advantages: Some(vec![1f32, 2., 3., 4.]),
            ..Default::default()
        };
        buffer.normalize_advantages();
        let advantages = buffer.advantages.unwrap();
        let mean = advantages.iter().sum::<f32>() / 4.;
        let variance = advantages.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 4.;
        assert!(mean.abs() < 1e-6);
        assert!((variance - 1.).abs() < 1e-4);
    }

    fn dummy_buffer(steps: usize, device: &Device) -> Result<RolloutBuffer> {
        let mut buffer = RolloutBuffer::default();
        for i in 0..steps {
            let state = Tensor::from_vec(vec![i as f32, 0.], 2, device)?;
            let action = Tensor::from_vec(vec![1f32, 0.], 2, device)?;
            buffer.push_step(state, action, 1., false, -0.5);
        }
        buffer.push_final_state(Tensor::from_vec(vec![steps as f32, 0.], 2, device)?);
        buffer.advantages = Some(vec![0.1; steps]);
        buffer.returns = Some(vec![0.2; steps]);
        Ok(buffer)
    }

    #[test]
    fn batch_iterator_covers_full_batches() -> Result<()> {
        let device = Device::Cpu;
        let rollouts = vec![dummy_buffer(10, &device)?, dummy_buffer(10, &device)?];
        let mut iter = RolloutBatchIterator::new(&rollouts, 8, device.clone());
        let mut batches = 0;
        while let Some(batch) = iter.next() {
            let batch = batch?;
            assert_eq!(batch.observations.dims(), &[8, 2]);
            assert_eq!(batch.actions.dims(), &[8, 2]);
            assert_eq!(batch.advantages.dims(), &[8]);
            assert_eq!(batch.returns.dims(), &[8]);
            assert_eq!(batch.logp_old.dims(), &[8]);
            batches += 1;
        }
        // 20 points in batches of 8: the trailing 4 are dropped
        assert_eq!(batches, 2);
        Ok(())
    }
}
