pub mod ppo;

pub use ppo::PPO;
