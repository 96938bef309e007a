use candle_core::{Device, Error, Result, Tensor};
use pyo3::{
    PyObject, Python,
    types::{PyAnyMethods, PyDict},
};
use rlx_core::{
    env::{Env, EnvStep, EnvironmentDescription, Space},
    env_builder::EnvBuilder,
};

/// A Gymnasium environment driven through the Python interpreter.
/// Observations come back as f32 tensors on the chosen device; one-hot
/// discrete actions are converted to indices and continuous actions are
/// clamped to the box bounds before they reach Python.
pub struct GymEnv {
    env: PyObject,
    action_space: Space,
    observation_space: Space,
    device: Device,
}

impl GymEnv {
    pub fn new(name: &str, device: &Device, render_mode: Option<String>) -> Result<GymEnv> {
        Python::with_gil(|py| -> pyo3::PyResult<GymEnv> {
            let gym = py.import("gymnasium")?;
            let kwargs = PyDict::new(py);
            if let Some(render_mode) = render_mode {
                kwargs.set_item("render_mode", render_mode)?;
            }
            let env = gym.getattr("make")?.call((name,), Some(&kwargs))?;
            let gym_spaces = py.import("gymnasium.spaces")?;
            let action_space = env.getattr("action_space")?;
            let action_space = if action_space.is_instance(&gym_spaces.getattr("Discrete")?)? {
                Space::Discrete(action_space.getattr("n")?.extract()?)
            } else {
                let low: Vec<f32> = action_space.getattr("low")?.extract()?;
                let high: Vec<f32> = action_space.getattr("high")?.extract()?;
                let size = low.len();
                Space::Continuous {
                    min: Some(low),
                    max: Some(high),
                    size,
                }
            };
            let observation_space: Vec<usize> =
                env.getattr("observation_space")?.getattr("shape")?.extract()?;
            Ok(GymEnv {
                env: env.into(),
                action_space,
                observation_space: Space::continuous_from_dims(observation_space),
                device: device.clone(),
            })
        })
        .map_err(Error::wrap)
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }
}

impl Env for GymEnv {
    fn reset(&mut self, seed: u64) -> Result<Tensor> {
        let state: Vec<f32> = Python::with_gil(|py| -> pyo3::PyResult<Vec<f32>> {
            let kwargs = PyDict::new(py);
            kwargs.set_item("seed", seed)?;
            let state = self.env.call_method(py, "reset", (), Some(&kwargs))?;
            state.bind(py).get_item(0)?.extract()
        })
        .map_err(Error::wrap)?;
        Tensor::from_vec(state, self.observation_space.size(), &self.device)
    }

    fn step(&mut self, action: &Tensor) -> Result<EnvStep> {
        let action_vec: Vec<f32> = action.to_vec1()?;
        let (state, reward, terminated, truncated): (Vec<f32>, f32, bool, bool) =
            Python::with_gil(|py| -> pyo3::PyResult<(Vec<f32>, f32, bool, bool)> {
                let step = match &self.action_space {
                    Space::Discrete(..) => {
                        let action = action_vec.iter().position(|x| *x > 0.).unwrap_or(0);
                        self.env.call_method(py, "step", (action,), None)?
                    }
                    Space::Continuous { min, max, .. } => {
                        let mut action = action_vec;
                        if let Some(min) = min {
                            for (a, lo) in action.iter_mut().zip(min.iter()) {
                                *a = a.max(*lo);
                            }
                        }
                        if let Some(max) = max {
                            for (a, hi) in action.iter_mut().zip(max.iter()) {
                                *a = a.min(*hi);
                            }
                        }
                        self.env.call_method(py, "step", (action,), None)?
                    }
                };
                let step = step.bind(py);
                Ok((
                    step.get_item(0)?.extract()?,
                    step.get_item(1)?.extract()?,
                    step.get_item(2)?.extract()?,
                    step.get_item(3)?.extract()?,
                ))
            })
            .map_err(Error::wrap)?;
        Ok(EnvStep {
            state: Tensor::from_vec(state, self.observation_space.size(), &self.device)?,
            reward,
            terminated,
            truncated,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(self.observation_space.clone(), self.action_space.clone())
    }
}

/// Builds one `GymEnv` per pool slot.
pub struct GymEnvBuilder {
    name: String,
    render_mode: Option<String>,
}

impl GymEnvBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            render_mode: None,
        }
    }

    pub fn with_render_mode(mut self, render_mode: &str) -> Self {
        self.render_mode = Some(render_mode.to_owned());
        self
    }
}

impl EnvBuilder for GymEnvBuilder {
    type Env = GymEnv;

    fn build_env(&self, device: &Device) -> Result<GymEnv> {
        GymEnv::new(&self.name, device, self.render_mode.clone())
    }
}

#[cfg(test)]
mod test {
    use super::GymEnv;
    use candle_core::{Device, Result};
    use rlx_core::env::{Env, Space};

    #[test]
    #[ignore = "needs a local gymnasium install"]
    fn lunar_lander_spaces() -> Result<()> {
        let device = Device::Cpu;
        let mut env = GymEnv::new("LunarLander-v2", &device, None)?;
        assert!(matches!(env.env_description().action_space, Space::Discrete(4)));
        assert_eq!(env.observation_size(), 8);
        let state = env.reset(0)?;
        assert_eq!(state.dims(), &[8]);
        Ok(())
    }
}
