use super::{EmptyVecStepHooks, StepOutcome, VecStepHooks, single_step_env};
use crate::{
    distributions::Distribution,
    env::{Env, EnvironmentDescription, RolloutMode},
    rng,
    utils::rollout_buffer::RolloutBuffer,
};
use candle_core::{Result, Tensor, bail};

/// Steps all envs in lockstep on the calling thread, the same way
/// stable-baselines' `DummyVecEnv` does. Env state persists across rollout
/// boundaries.
pub struct SequentialVecPool<E: Env> {
    envs: Vec<E>,
    buffers: Vec<RolloutBuffer>,
    last_states: Vec<Option<Tensor>>,
    rollout_mode: RolloutMode,
    env_description: EnvironmentDescription,
    hooks: Box<dyn VecStepHooks>,
}

impl<E: Env> SequentialVecPool<E> {
    pub fn new(envs: Vec<E>, rollout_mode: RolloutMode) -> Result<Self> {
        Self::with_hooks(envs, rollout_mode, Box::new(EmptyVecStepHooks))
    }

    pub fn with_hooks(
        envs: Vec<E>,
        rollout_mode: RolloutMode,
        hooks: Box<dyn VecStepHooks>,
    ) -> Result<Self> {
        let Some(env) = envs.first() else {
            bail!("a vec pool needs at least one env")
        };
        let env_description = env.env_description();
        let n_envs = envs.len();
        Ok(Self {
            envs,
            buffers: vec![RolloutBuffer::default(); n_envs],
            last_states: vec![None; n_envs],
            rollout_mode,
            env_description,
            hooks,
        })
    }

    fn step_all<D: Distribution>(&mut self, distr: &D, states: &mut [Tensor]) -> Result<()> {
        let mut outcomes = Vec::with_capacity(self.envs.len());
        for (env, state) in self.envs.iter_mut().zip(states.iter()) {
            outcomes.push(single_step_env(distr, state, env)?);
        }
        self.hooks.step_hook(distr, &mut outcomes)?;
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            let StepOutcome {
                next_state,
                action,
                reward,
                logp,
                done,
            } = outcome;
            self.buffers[idx].push_step(states[idx].clone(), action, reward, done, logp);
            states[idx] = next_state;
        }
        Ok(())
    }

    pub fn collect_rollouts<D: Distribution>(&mut self, distr: &D) -> Result<Vec<RolloutBuffer>> {
        let mut states = self
            .envs
            .iter_mut()
            .zip(self.last_states.iter_mut())
            .map(|(env, last_state)| match last_state.take() {
                Some(state) => Ok(state),
                None => env.reset(rng::next_seed()),
            })
            .collect::<Result<Vec<_>>>()?;
        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }
        match self.rollout_mode {
            RolloutMode::StepBound { n_steps } => {
                for _ in 0..n_steps {
                    self.step_all(distr, &mut states)?;
                }
            }
            RolloutMode::EpisodeBound { n_episodes } => {
                let mut episodes = 0;
                while episodes < n_episodes {
                    self.step_all(distr, &mut states)?;
                    episodes = self.buffers.iter().map(|b| b.episodes()).sum();
                }
            }
        }
        self.hooks.rollout_end_hook(&mut states)?;
        for (idx, state) in states.into_iter().enumerate() {
            self.buffers[idx].push_final_state(state.clone());
            self.last_states[idx] = Some(state);
        }
        Ok(self.buffers.clone())
    }

    pub fn env_description(&self) -> EnvironmentDescription {
        self.env_description.clone()
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }
}
