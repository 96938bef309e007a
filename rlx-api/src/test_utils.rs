use candle_core::{Device, Result, Tensor};
use rlx_core::env::{Env, EnvStep, EnvironmentDescription, Space};

/// Corridor of `goal` cells for tests: action 1 moves right for +1 reward,
/// action 0 moves left for -1. Terminates at the goal, truncates after
/// `max_steps`. The optimal return is `goal`.
pub struct CorridorEnv {
    pos: i64,
    goal: i64,
    steps: usize,
    max_steps: usize,
    device: Device,
}

impl CorridorEnv {
    pub fn new(goal: i64, max_steps: usize, device: &Device) -> Self {
        Self {
            pos: 0,
            goal,
            steps: 0,
            max_steps,
            device: device.clone(),
        }
    }

    fn observe(&self) -> Result<Tensor> {
        // scaled so the observation stays within [0, 1]
        Tensor::from_vec(vec![self.pos as f32 / self.goal as f32], 1, &self.device)
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
        EnvironmentDescription::new(Space::continuous_from_dims(vec![1]), Space::Discrete(2))
    }
}
