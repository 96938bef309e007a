use crate::utils::evaluator::{EvalStats, Evaluator};
use candle_core::{Device, Result};
use rlx_core::{
    env::RolloutMode,
    env_builder::EnvBuilder,
    env_pools::{SequentialVecPool, ThreadVecPool, VecPoolKind},
};
use std::sync::{Arc, Mutex};

/// Periodic evaluation attached to a sequential pool. The shared results
/// handle lets the caller keep reading after the pool takes ownership.
pub struct EvaluatorOptions {
    pub eval_episodes: usize,
    pub eval_freq: usize,
    pub results: Arc<Mutex<Vec<EvalStats>>>,
}

impl EvaluatorOptions {
    pub fn new(eval_episodes: usize, eval_freq: usize) -> Self {
        Self {
            eval_episodes,
            eval_freq,
            results: Arc::default(),
        }
    }

    pub fn results(&self) -> Arc<Mutex<Vec<EvalStats>>> {
        self.results.clone()
    }
}

#[derive(Default)]
pub enum SequentialHooks {
    #[default]
    None,
    Evaluator(EvaluatorOptions),
}

/// Which vectorization strategy a pool uses. `Sequential` steps envs in
/// lockstep on the calling thread; `Threaded` runs one worker per env.
pub enum VecPoolType {
    Sequential(SequentialHooks),
    Threaded,
}

impl Default for VecPoolType {
    fn default() -> Self {
        Self::Sequential(SequentialHooks::default())
    }
}

impl VecPoolType {
    pub fn build<EB: EnvBuilder>(
        &self,
        device: &Device,
        env_builder: &EB,
        n_envs: usize,
        rollout_mode: RolloutMode,
    ) -> Result<VecPoolKind<EB::Env>>
    where
        EB::Env: Send + 'static,
    {
        let envs = (0..n_envs)
            .map(|_| env_builder.build_env(device))
            .collect::<Result<Vec<_>>>()?;
        match self {
            Self::Threaded => Ok(VecPoolKind::Threaded(ThreadVecPool::new(
                envs,
                rollout_mode,
            )?)),
            Self::Sequential(SequentialHooks::None) => Ok(VecPoolKind::Sequential(
                SequentialVecPool::new(envs, rollout_mode)?,
            )),
            Self::Sequential(SequentialHooks::Evaluator(options)) => {
                let eval_env = env_builder.build_env(device)?;
                let evaluator = Evaluator::new(
                    eval_env,
                    options.eval_episodes,
                    options.eval_freq,
                    options.results(),
                );
                Ok(VecPoolKind::Sequential(SequentialVecPool::with_hooks(
                    envs,
                    rollout_mode,
                    Box::new(evaluator),
                )?))
            }
        }
    }
}
