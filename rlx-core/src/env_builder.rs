use crate::env::Env;
use candle_core::{Device, Result};

/// Constructs one environment per pool slot. Pools call this once per slot
/// plus once more when a hook needs a private env of its own.
pub trait EnvBuilder {
    type Env: Env;

    fn build_env(&self, device: &Device) -> Result<Self::Env>;
}

impl<E: Env, F: Fn(&Device) -> Result<E>> EnvBuilder for F {
    type Env = E;

    fn build_env(&self, device: &Device) -> Result<E> {
        self(device)
    }
}
