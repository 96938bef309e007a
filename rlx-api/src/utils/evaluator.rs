use candle_core::{Result, Tensor};
use rlx_core::{
    distributions::Distribution,
    env::Env,
    env_pools::{StepOutcome, VecStepHooks},
    rng,
};
use std::sync::{Arc, Mutex};

/// Mean and population standard deviation of per-episode returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalStats {
    pub mean_reward: f32,
    pub std_reward: f32,
}

impl EvalStats {
    pub fn from_returns(returns: &[f32]) -> Self {
        if returns.is_empty() {
            return Self {
                mean_reward: 0.,
                std_reward: 0.,
            };
        }
        let mean = returns.iter().sum::<f32>() / returns.len() as f32;
        let variance =
            returns.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / returns.len() as f32;
        Self {
            mean_reward: mean,
            std_reward: variance.sqrt(),
        }
    }
}

/// Runs the stochastic policy for `n_episodes` complete episodes and
/// reports the return statistics.
pub fn evaluate_policy<D: Distribution + ?Sized, E: Env>(
    distr: &D,
    env: &mut E,
    n_episodes: usize,
) -> Result<EvalStats> {
    let mut episode_returns = Vec::with_capacity(n_episodes);
    for _ in 0..n_episodes {
        let mut state = env.reset(rng::next_seed())?;
        let mut episode_return = 0f32;
        loop {
            let (action, _logp) = distr.get_action(&state.unsqueeze(0)?)?;
            let step = env.step(&action)?;
            episode_return += step.reward;
            if step.terminated || step.truncated {
                break;
            }
            state = step.state;
        }
        episode_returns.push(episode_return);
    }
    Ok(EvalStats::from_returns(&episode_returns))
}

/// Periodic in-training evaluation on a private env. Attached to a
/// sequential pool it fires every `eval_freq` collected env steps; the
/// results stay shared so the experiment runner can read them afterwards.
pub struct Evaluator<E: Env> {
    env: E,
    eval_episodes: usize,
    eval_freq: usize,
    steps_since_eval: usize,
    results: Arc<Mutex<Vec<EvalStats>>>,
}

impl<E: Env> Evaluator<E> {
    pub fn new(
        env: E,
        eval_episodes: usize,
        eval_freq: usize,
        results: Arc<Mutex<Vec<EvalStats>>>,
    ) -> Self {
        Self {
            env,
            eval_episodes,
            eval_freq,
            steps_since_eval: 0,
            results,
        }
    }

    pub fn results(&self) -> Arc<Mutex<Vec<EvalStats>>> {
        self.results.clone()
    }
}

impl<E: Env> VecStepHooks for Evaluator<E> {
    fn step_hook(
        &mut self,
        distr: &dyn Distribution,
        outcomes: &mut [StepOutcome],
    ) -> Result<()> {
        self.steps_since_eval += outcomes.len();
        if self.steps_since_eval < self.eval_freq {
            return Ok(());
        }
        let stats = evaluate_policy(distr, &mut self.env, self.eval_episodes)?;
        self.results
            .lock()
            .map_err(|_| candle_core::Error::Msg("evaluator results lock poisoned".into()))?
            .push(stats);
        self.steps_since_eval = 0;
        Ok(())
    }

    fn rollout_end_hook(&mut self, _last_states: &mut [Tensor]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::EvalStats;

    #[test]
    fn stats_from_returns() {
        let stats = EvalStats::from_returns(&[1., 2., 3., 4.]);
        assert!((stats.mean_reward - 2.5).abs() < 1e-6);
        // population std of 1..4
        assert!((stats.std_reward - 1.118034).abs() < 1e-5);
    }

    #[test]
    fn stats_of_empty_returns_are_zero() {
        let stats = EvalStats::from_returns(&[]);
        assert_eq!(stats.mean_reward, 0.);
        assert_eq!(stats.std_reward, 0.);
    }
}
