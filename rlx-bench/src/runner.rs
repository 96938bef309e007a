use crate::config::{ExperimentConfig, PoolChoice};
use crate::report::EvalLog;
use anyhow::{Context, Result};
use rlx_api::builders::{
    env_pool::{EvaluatorOptions, SequentialHooks, VecPoolType},
    on_policy_algo::OnPolicyAlgorithmBuilder,
    ppo::PPOBuilder,
};
use rlx_api::utils::evaluator::evaluate_policy;
use rlx_core::{
    Algorithm,
    agents::Agent,
    env::RolloutMode,
    on_policy_algorithm::LearningSchedule,
    rng,
};
use rlx_gym::{GymEnv, GymEnvBuilder};
use std::time::Instant;
use tracing::{debug, info};

fn ppo_builder(config: &ExperimentConfig) -> PPOBuilder {
    let mut builder = PPOBuilder {
        clip_range: config.ppo.clip_range,
        gamma: config.ppo.gamma,
        lambda: config.ppo.gae_lambda,
        batch_size: config.ppo.batch_size,
        n_epochs: config.ppo.n_epochs,
        ent_coef: config.ppo.ent_coef,
        vf_coef: config.ppo.vf_coef,
        normalize_advantage: config.ppo.normalize_advantage,
        target_kl: config.ppo.target_kl,
        ..Default::default()
    };
    builder.policy_builder.learning_rate = config.ppo.learning_rate;
    if let rlx_api::builders::policies::PolicyType::Shared { max_grad_norm, .. } =
        &mut builder.policy_builder.policy_type
    {
        *max_grad_norm = config.ppo.max_grad_norm;
    }
    builder
}

/// Runs `n_experiments` independent training runs and appends one result
/// line per run.
pub fn run(config: ExperimentConfig) -> Result<()> {
    let device = config.device.device()?;
    let log = EvalLog::create(&config.out_prefix)?;
    info!(
        env_id = %config.env_id,
        n_envs = config.n_envs,
        n_experiments = config.n_experiments,
        total_timesteps = config.total_timesteps,
        log = %log.path().display(),
        "starting experiment sweep"
    );

    for experiment in 0..config.n_experiments {
        rng::set_global_seed(experiment as u64);
        // a handful of episodes per checkpoint keeps the training overhead low
        let periodic_eval = config
            .eval_freq
            .map(|eval_freq| EvaluatorOptions::new(5, eval_freq));
        let periodic_results = periodic_eval.as_ref().map(|options| options.results());
        let pool_type = match (config.pool, periodic_eval) {
            (PoolChoice::Threaded, _) => VecPoolType::Threaded,
            (PoolChoice::Sequential, None) => VecPoolType::Sequential(SequentialHooks::None),
            (PoolChoice::Sequential, Some(options)) => {
                VecPoolType::Sequential(SequentialHooks::Evaluator(options))
            }
        };

        let mut builder = OnPolicyAlgorithmBuilder::ppo();
        builder.set_device(device.clone());
        builder.pool_type = pool_type;
        builder.set_rollout_mode(RolloutMode::StepBound {
            n_steps: config.ppo.n_steps,
        });
        builder.set_learning_schedule(LearningSchedule::total_step_bound(config.total_timesteps));
        builder.ppo = ppo_builder(&config);
        let env_builder = GymEnvBuilder::new(&config.env_id);
        let mut algo = builder
            .build(&env_builder, config.n_envs)
            .context("building the training setup")?;

        let start = Instant::now();
        algo.train()
            .with_context(|| format!("training experiment {experiment}"))?;
        let duration = start.elapsed().as_secs_f64();

        if let Some(results) = periodic_results {
            let results = results
                .lock()
                .map_err(|_| anyhow::anyhow!("evaluator results lock poisoned"))?;
            for (idx, stats) in results.iter().enumerate() {
                debug!(
                    experiment,
                    eval = idx,
                    mean = stats.mean_reward,
                    std = stats.std_reward,
                    "in-training evaluation"
                );
            }
        }

        if config.save_models {
            let mut path = config.out_prefix.clone().into_os_string();
            path.push(format!("_{experiment}.safetensors"));
            algo.agent
                .policy
                .save_weights(&path)
                .context("saving the policy weights")?;
        }

        let mut eval_env = GymEnv::new(&config.env_id, &device, None)?;
        let stats = evaluate_policy(
            algo.agent.distribution(),
            &mut eval_env,
            config.eval_episodes,
        )?;
        info!(
            experiment,
            mean_reward = stats.mean_reward,
            std_reward = stats.std_reward,
            duration_secs = duration,
            "experiment finished"
        );
        log.append(&stats, duration)?;
    }
    Ok(())
}
