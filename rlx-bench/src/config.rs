use anyhow::{Context, Result, bail};
use candle_core::Device;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PoolChoice {
    /// Step all envs on the main thread, like DummyVecEnv.
    Sequential,
    /// One worker thread per env.
    Threaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceChoice {
    Cpu,
    Cuda,
    /// CUDA when available, CPU otherwise.
    Auto,
}

impl DeviceChoice {
    pub fn device(&self) -> candle_core::Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda => Device::new_cuda(0),
            Self::Auto => Device::cuda_if_available(0),
        }
    }
}

/// PPO hyperparameters of a run. The defaults reproduce the LunarLander
/// reference configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PpoParams {
    pub learning_rate: f64,
    pub n_steps: usize,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub clip_range: f32,
    pub ent_coef: f32,
    pub vf_coef: f32,
    pub max_grad_norm: Option<f32>,
    pub normalize_advantage: bool,
    pub target_kl: Option<f32>,
}

impl Default for PpoParams {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_steps: 1024,
            batch_size: 64,
            n_epochs: 4,
            gamma: 0.99,
            gae_lambda: 0.98,
            clip_range: 0.2,
            ent_coef: 0.01,
            vf_coef: 0.1,
            max_grad_norm: Some(0.5),
            normalize_advantage: false,
            target_kl: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub env_id: String,
    pub n_envs: usize,
    pub total_timesteps: usize,
    pub n_experiments: usize,
    pub eval_episodes: usize,
    pub out_prefix: PathBuf,
    pub device: DeviceChoice,
    pub pool: PoolChoice,
    pub save_models: bool,
    /// In-training evaluation every this many collected steps. Off when
    /// absent; requires the sequential pool.
    pub eval_freq: Option<usize>,
    pub ppo: PpoParams,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            env_id: "LunarLander-v2".to_owned(),
            n_envs: 16,
            total_timesteps: 1_000_000,
            n_experiments: 50,
            eval_episodes: 100,
            out_prefix: PathBuf::from("data/ppo/lunar_lander/rlx"),
            device: DeviceChoice::Auto,
            pool: PoolChoice::Sequential,
            save_models: false,
            eval_freq: None,
            ppo: PpoParams::default(),
        }
    }
}

/// Runs repeated PPO training experiments and appends the evaluation
/// results to a text log.
#[derive(Debug, Parser)]
#[command(name = "rlx-bench")]
pub struct Args {
    /// TOML file with an [ppo] table; CLI flags override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub env_id: Option<String>,

    #[arg(long)]
    pub n_envs: Option<usize>,

    #[arg(long)]
    pub total_timesteps: Option<usize>,

    #[arg(long)]
    pub n_experiments: Option<usize>,

    #[arg(long)]
    pub eval_episodes: Option<usize>,

    #[arg(long)]
    pub out_prefix: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub device: Option<DeviceChoice>,

    #[arg(long, value_enum)]
    pub pool: Option<PoolChoice>,

    #[arg(long)]
    pub save_models: bool,

    #[arg(long)]
    pub eval_freq: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    #[arg(long)]
    pub n_steps: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub n_epochs: Option<usize>,
}

impl ExperimentConfig {
    /// File config under CLI overrides, defaults underneath both.
    pub fn resolve(args: Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw).context("parsing config file")?
            }
            None => Self::default(),
        };
        if let Some(env_id) = args.env_id {
            config.env_id = env_id;
        }
        if let Some(n_envs) = args.n_envs {
            config.n_envs = n_envs;
        }
        if let Some(total_timesteps) = args.total_timesteps {
            config.total_timesteps = total_timesteps;
        }
        if let Some(n_experiments) = args.n_experiments {
            config.n_experiments = n_experiments;
        }
        if let Some(eval_episodes) = args.eval_episodes {
            config.eval_episodes = eval_episodes;
        }
        if let Some(out_prefix) = args.out_prefix {
            config.out_prefix = out_prefix;
        }
        if let Some(device) = args.device {
            config.device = device;
        }
        if let Some(pool) = args.pool {
            config.pool = pool;
        }
        if args.save_models {
            config.save_models = true;
        }
        if let Some(eval_freq) = args.eval_freq {
            config.eval_freq = Some(eval_freq);
        }
        if let Some(learning_rate) = args.learning_rate {
            config.ppo.learning_rate = learning_rate;
        }
        if let Some(n_steps) = args.n_steps {
            config.ppo.n_steps = n_steps;
        }
        if let Some(batch_size) = args.batch_size {
            config.ppo.batch_size = batch_size;
        }
        if let Some(n_epochs) = args.n_epochs {
            config.ppo.n_epochs = n_epochs;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.n_envs == 0 {
            bail!("n_envs must be at least 1");
        }
        if self.ppo.batch_size > self.ppo.n_steps * self.n_envs {
            bail!(
                "batch_size {} exceeds the {} transitions a rollout collects",
                self.ppo.batch_size,
                self.ppo.n_steps * self.n_envs
            );
        }
        if self.eval_freq.is_some() && self.pool != PoolChoice::Sequential {
            bail!("in-training evaluation needs the sequential pool");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Args, DeviceChoice, ExperimentConfig, PoolChoice};
    use clap::Parser;

    #[test]
    fn defaults_match_the_reference_run() {
        let config = ExperimentConfig::default();
        assert_eq!(config.env_id, "LunarLander-v2");
        assert_eq!(config.n_envs, 16);
        assert_eq!(config.total_timesteps, 1_000_000);
        assert_eq!(config.n_experiments, 50);
        assert_eq!(config.eval_episodes, 100);
        assert_eq!(config.ppo.learning_rate, 3e-4);
        assert_eq!(config.ppo.n_steps, 1024);
        assert_eq!(config.ppo.batch_size, 64);
        assert_eq!(config.ppo.n_epochs, 4);
        assert_eq!(config.ppo.gamma, 0.99);
        assert_eq!(config.ppo.gae_lambda, 0.98);
        assert_eq!(config.ppo.clip_range, 0.2);
        assert_eq!(config.ppo.ent_coef, 0.01);
        assert_eq!(config.ppo.vf_coef, 0.1);
        assert_eq!(config.ppo.max_grad_norm, Some(0.5));
        assert!(!config.ppo.normalize_advantage);
        assert!(config.ppo.target_kl.is_none());
    }

    #[test]
    fn cli_overrides_defaults() {
        let args = Args::parse_from([
            "rlx-bench",
            "--n-experiments",
            "2",
            "--n-envs",
            "4",
            "--learning-rate",
            "0.001",
            "--device",
            "cpu",
            "--pool",
            "threaded",
        ]);
        let config = ExperimentConfig::resolve(args).unwrap();
        assert_eq!(config.n_experiments, 2);
        assert_eq!(config.n_envs, 4);
        assert_eq!(config.ppo.learning_rate, 1e-3);
        assert_eq!(config.device, DeviceChoice::Cpu);
        assert_eq!(config.pool, PoolChoice::Threaded);
        // untouched fields keep their defaults
        assert_eq!(config.ppo.n_steps, 1024);
    }

    #[test]
    fn toml_config_is_partial() {
        let raw = r#"
            n_experiments = 3
            env_id = "CartPole-v1"

            [ppo]
            n_steps = 256
        "#;
        let config: ExperimentConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.n_experiments, 3);
        assert_eq!(config.env_id, "CartPole-v1");
        assert_eq!(config.ppo.n_steps, 256);
        assert_eq!(config.ppo.batch_size, 64);
        assert_eq!(config.n_envs, 16);
    }

    #[test]
    fn rejects_oversized_batch() {
        let mut config = ExperimentConfig::default();
        config.n_envs = 1;
        config.ppo.n_steps = 32;
        config.ppo.batch_size = 64;
        assert!(config.validate().is_err());
    }
}
