pub mod sequential_vec_pool;
pub mod thread_vec_pool;

use crate::{
    distributions::Distribution,
    env::{Env, EnvironmentDescription, RolloutMode},
    rng,
    utils::rollout_buffer::RolloutBuffer,
};
use candle_core::{Result, Tensor};
pub use sequential_vec_pool::SequentialVecPool;
pub use thread_vec_pool::ThreadVecPool;

/// Collects one rollout per environment and hands the buffers to the agent.
pub trait EnvPool {
    fn collect_rollouts<D: Distribution>(&mut self, distr: &D) -> Result<Vec<RolloutBuffer>>;

    fn env_description(&self) -> EnvironmentDescription;

    fn num_envs(&self) -> usize;
}

/// Everything a single env step produces. `next_state` is already the
/// post-reset observation when the episode ended.
pub struct StepOutcome {
    pub next_state: Tensor,
    pub action: Tensor,
    pub reward: f32,
    pub logp: f32,
    pub done: bool,
}

/// Hooks invoked by [`SequentialVecPool`] while it steps its envs in
/// lockstep. The periodic evaluator attaches here.
pub trait VecStepHooks {
    /// After every synchronized step across the pool.
    fn step_hook(
        &mut self,
        distr: &dyn Distribution,
        outcomes: &mut [StepOutcome],
    ) -> Result<()>;

    /// After the rollout is collected, before the final states are stored.
    fn rollout_end_hook(&mut self, last_states: &mut [Tensor]) -> Result<()>;
}

pub struct EmptyVecStepHooks;

impl VecStepHooks for EmptyVecStepHooks {
    fn step_hook(&mut self, _distr: &dyn Distribution, _outcomes: &mut [StepOutcome]) -> Result<()> {
        Ok(())
    }

    fn rollout_end_hook(&mut self, _last_states: &mut [Tensor]) -> Result<()> {
        Ok(())
    }
}

/// Samples an action for `state`, steps the env and resets it when the
/// episode ended.
pub fn single_step_env<D: Distribution + ?Sized, E: Env>(
    distr: &D,
    state: &Tensor,
    env: &mut E,
) -> Result<StepOutcome> {
    let (action, logp) = distr.get_action(&state.unsqueeze(0)?)?;
    let step = env.step(&action)?;
    let done = step.terminated || step.truncated;
    let next_state = if done {
        env.reset(rng::next_seed())?
    } else {
        step.state
    };
    Ok(StepOutcome {
        next_state,
        action,
        reward: step.reward,
        logp: logp.to_scalar()?,
        done,
    })
}

/// Collects a full rollout from one env, continuing from `initial_state`
/// when the previous rollout left one behind. Returns the buffer together
/// with the state to continue from.
pub fn run_rollout<D: Distribution + ?Sized, E: Env>(
    distr: &D,
    env: &mut E,
    mode: RolloutMode,
    initial_state: Option<Tensor>,
) -> Result<(RolloutBuffer, Tensor)> {
    let mut buffer = RolloutBuffer::default();
    let mut state = match initial_state {
        Some(state) => state,
        None => env.reset(rng::next_seed())?,
    };
    match mode {
        RolloutMode::StepBound { n_steps } => {
            for _ in 0..n_steps {
                let outcome = single_step_env(distr, &state, env)?;
                buffer.push_step(state, outcome.action, outcome.reward, outcome.done, outcome.logp);
                state = outcome.next_state;
            }
        }
        RolloutMode::EpisodeBound { n_episodes } => {
            let mut episodes = 0;
            while episodes < n_episodes {
                let outcome = single_step_env(distr, &state, env)?;
                if outcome.done {
                    episodes += 1;
                }
                buffer.push_step(state, outcome.action, outcome.reward, outcome.done, outcome.logp);
                state = outcome.next_state;
            }
        }
    }
    buffer.push_final_state(state.clone());
    Ok((buffer, state))
}

pub enum VecPoolKind<E: Env> {
    Sequential(SequentialVecPool<E>),
    Threaded(ThreadVecPool<E>),
}

impl<E: Env + Send> EnvPool for VecPoolKind<E> {
    fn collect_rollouts<D: Distribution>(&mut self, distr: &D) -> Result<Vec<RolloutBuffer>> {
        match self {
            Self::Sequential(pool) => pool.collect_rollouts(distr),
            Self::Threaded(pool) => pool.collect_rollouts(distr),
        }
    }

    fn env_description(&self) -> EnvironmentDescription {
        match self {
            Self::Sequential(pool) => pool.env_description(),
            Self::Threaded(pool) => pool.env_description(),
        }
    }

    fn num_envs(&self) -> usize {
        match self {
            Self::Sequential(pool) => pool.num_envs(),
            Self::Threaded(pool) => pool.num_envs(),
        }
    }
}
