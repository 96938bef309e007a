use candle_core::{DType, Device, Result, Tensor};
use rlx_core::{
    distributions::Distribution,
    env::{Env, EnvStep, EnvironmentDescription, RolloutMode, Space},
    env_pools::{EnvPool, SequentialVecPool, ThreadVecPool, VecPoolKind},
};

/// Corridor of `goal` cells. Action 1 moves right, action 0 moves left,
/// the episode terminates at the goal and truncates after `max_steps`.
struct CorridorEnv {
    pos: i64,
    goal: i64,
    steps: usize,
    max_steps: usize,
    device: Device,
}

impl CorridorEnv {
    fn new(goal: i64, max_steps: usize) -> Self {
        Self {
            pos: 0,
            goal,
            steps: 0,
            max_steps,
            device: Device::Cpu,
        }
    }

    fn observe(&self) -> Result<Tensor> {
        Tensor::from_vec(vec![self.pos as f32], 1, &self.device)
    }
}

impl Env for CorridorEnv {
    fn reset(&mut self, _seed: u64) -> Result<Tensor> {
        self.pos = 0;
        self.steps = 0;
        self.observe()
    }

    fn step(&mut self, action: &Tensor) -> Result<EnvStep> {
        let action: Vec<f32> = action.to_vec1()?;
        let right = action.iter().position(|x| *x > 0.).unwrap_or(0) == 1;
        let (delta, reward) = if right { (1, 1.) } else { (-1, -1.) };
        self.pos = (self.pos + delta).max(0);
        self.steps += 1;
        Ok(EnvStep {
            state: self.observe()?,
            reward,
            terminated: self.pos >= self.goal,
            truncated: self.steps >= self.max_steps,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(
            Space::continuous_from_dims(vec![1]),
            Space::Discrete(2),
        )
    }
}

/// Always walks right, with a fixed log probability.
struct AlwaysRight;

impl Distribution for AlwaysRight {
    fn get_action(&self, _observation: &Tensor) -> Result<(Tensor, Tensor)> {
        let action = Tensor::from_vec(vec![0f32, 1.], 2, &Device::Cpu)?;
        let logp = Tensor::zeros((), DType::F32, &Device::Cpu)?;
        Ok((action, logp))
    }

    fn log_probs(&self, states: &Tensor, _actions: &Tensor) -> Result<Tensor> {
        Tensor::zeros(states.dim(0)?, DType::F32, &Device::Cpu)
    }

    fn entropy(&self, states: &Tensor) -> Result<Tensor> {
        Tensor::zeros(states.dim(0)?, DType::F32, &Device::Cpu)
    }
}

fn corridor_envs(n: usize) -> Vec<CorridorEnv> {
    (0..n).map(|_| CorridorEnv::new(5, 20)).collect()
}

#[test]
fn sequential_pool_step_accounting() -> Result<()> {
    let pool = SequentialVecPool::new(corridor_envs(3), RolloutMode::StepBound { n_steps: 8 })?;
    let mut pool = VecPoolKind::Sequential(pool);
    let rollouts = pool.collect_rollouts(&AlwaysRight)?;
    assert_eq!(rollouts.len(), 3);
    for rb in &rollouts {
        assert_eq!(rb.len(), 8);
        assert_eq!(rb.states.len(), 9);
        assert_eq!(rb.actions.len(), 8);
        // walking right terminates once per 5 steps
        assert_eq!(rb.episodes(), 1);
    }
    Ok(())
}

#[test]
fn threaded_pool_step_accounting() -> Result<()> {
    let pool = ThreadVecPool::new(corridor_envs(4), RolloutMode::StepBound { n_steps: 8 })?;
    let mut pool = VecPoolKind::Threaded(pool);
    let rollouts = pool.collect_rollouts(&AlwaysRight)?;
    assert_eq!(rollouts.len(), 4);
    for rb in &rollouts {
        assert_eq!(rb.len(), 8);
        assert_eq!(rb.states.len(), 9);
    }
    Ok(())
}

#[test]
fn env_state_persists_across_rollouts() -> Result<()> {
    let pool = SequentialVecPool::new(corridor_envs(1), RolloutMode::StepBound { n_steps: 3 })?;
    let mut pool = VecPoolKind::Sequential(pool);
    let first = pool.collect_rollouts(&AlwaysRight)?;
    let second = pool.collect_rollouts(&AlwaysRight)?;
    let last_state: Vec<f32> = first[0].states[3].to_vec1()?;
    let resumed_state: Vec<f32> = second[0].states[0].to_vec1()?;
    assert_eq!(last_state, resumed_state);
    // three more right steps from position 3 cross the goal at 5
    assert_eq!(second[0].episodes(), 1);
    Ok(())
}

#[test]
fn episode_bound_rollout_collects_full_episodes() -> Result<()> {
    let pool = SequentialVecPool::new(corridor_envs(1), RolloutMode::EpisodeBound { n_episodes: 2 })?;
    let mut pool = VecPoolKind::Sequential(pool);
    let rollouts = pool.collect_rollouts(&AlwaysRight)?;
    assert_eq!(rollouts[0].episodes(), 2);
    // two clean episodes of five right steps each
    assert_eq!(rollouts[0].len(), 10);
    assert_eq!(rollouts[0].total_reward(), 10.);
    Ok(())
}
