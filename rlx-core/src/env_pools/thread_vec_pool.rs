use super::run_rollout;
use crate::{
    distributions::Distribution,
    env::{Env, EnvironmentDescription, RolloutMode},
    rng,
    utils::rollout_buffer::RolloutBuffer,
};
use candle_core::{Error, Result, Tensor, bail};
use crossbeam::channel;

/// One worker thread per env. Workers borrow the distribution for the
/// duration of a rollout, so the threads are scoped to each
/// `collect_rollouts` call.
pub struct ThreadVecPool<E: Env> {
    envs: Vec<E>,
    last_states: Vec<Option<Tensor>>,
    rollout_mode: RolloutMode,
    env_description: EnvironmentDescription,
}

impl<E: Env + Send> ThreadVecPool<E> {
    pub fn new(envs: Vec<E>, rollout_mode: RolloutMode) -> Result<Self> {
        let Some(env) = envs.first() else {
            bail!("a vec pool needs at least one env")
        };
        let env_description = env.env_description();
        let n_envs = envs.len();
        Ok(Self {
            envs,
            last_states: vec![None; n_envs],
            rollout_mode,
            env_description,
        })
    }

    pub fn collect_rollouts<D: Distribution>(&mut self, distr: &D) -> Result<Vec<RolloutBuffer>> {
        let n_envs = self.envs.len();
        // worker threads carry their own thread-local generator, so each one
        // is reseeded from the pool's stream
        let base_seed = rng::next_seed();
        let rollout_mode = self.rollout_mode;
        let (result_tx, result_rx) = channel::unbounded();
        crossbeam::thread::scope(|scope| {
            for (env_idx, (env, last_state)) in self
                .envs
                .iter_mut()
                .zip(self.last_states.iter_mut())
                .enumerate()
            {
                let result_tx = result_tx.clone();
                let initial_state = last_state.take();
                scope.spawn(move |_| {
                    rng::set_global_seed(base_seed.wrapping_add(env_idx as u64));
                    let rollout = run_rollout(distr, env, rollout_mode, initial_state);
                    let _ = result_tx.send((env_idx, rollout));
                });
            }
        })
        .map_err(|_| Error::Msg("rollout worker panicked".into()))?;
        drop(result_tx);

        let mut buffers = vec![RolloutBuffer::default(); n_envs];
        for (env_idx, rollout) in result_rx.iter() {
            let (buffer, last_state) = rollout?;
            buffers[env_idx] = buffer;
            self.last_states[env_idx] = Some(last_state);
        }
        Ok(buffers)
    }

    pub fn env_description(&self) -> EnvironmentDescription {
        self.env_description.clone()
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }
}
