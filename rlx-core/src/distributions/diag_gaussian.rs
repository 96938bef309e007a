use super::Distribution;
use crate::network::{MlpNet, build_mlp};
use candle_core::{Result, Tensor};
use candle_nn::{Module, VarBuilder};
use std::f32::consts::PI;

/// Gaussian with a state-dependent mean and a learned, state-independent
/// log standard deviation per action dimension.
#[derive(Debug)]
pub struct DiagGaussianDistribution {
    mu_net: MlpNet,
    log_std: Tensor,
}

impl DiagGaussianDistribution {
    pub fn build(
        input_dim: usize,
        action_size: usize,
        layers: &[usize],
        vb: &VarBuilder,
        prefix: &str,
    ) -> Result<Self> {
        let mu_net = build_mlp(input_dim, layers, vb, prefix)?;
        let log_std = vb.get(action_size, "log_std")?;
        Ok(Self { mu_net, log_std })
    }

    fn logp_from_mu(&self, mu: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let var = self.log_std.exp()?.sqr()?;
        let log_sqrt_2pi = (2f32 * PI).sqrt().ln();
        let quad = actions.sub(mu)?.sqr()?.broadcast_div(&(var * 2f64)?)?;
        let logp = quad.neg()?.broadcast_sub(&self.log_std)?;
        let logp = logp.affine(1., -(log_sqrt_2pi as f64))?;
        logp.sum(1)
    }
}

impl Distribution for DiagGaussianDistribution {
    fn get_action(&self, observation: &Tensor) -> Result<(Tensor, Tensor)> {
        let mu = self.mu_net.forward(observation)?;
        let std = self.log_std.exp()?;
        let noise = mu.randn_like(0., 1.)?;
        let action = mu.add(&noise.broadcast_mul(&std)?)?;
        let logp = self.logp_from_mu(&mu, &action)?.squeeze(0)?;
        Ok((action.squeeze(0)?.detach(), logp))
    }

    fn log_probs(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let mu = self.mu_net.forward(states)?;
        self.logp_from_mu(&mu, actions)
    }

    fn entropy(&self, states: &Tensor) -> Result<Tensor> {
        // 0.5 * (1 + ln 2pi) + log_std per dimension, independent of the state
        let const_term = 0.5 * (1f32 + (2f32 * PI).ln());
        let entropy = self.log_std.affine(1., const_term as f64)?.sum_all()?;
        entropy.broadcast_as(states.dim(0)?)
    }
}

#[cfg(test)]
mod test {
    use super::DiagGaussianDistribution;
    use crate::distributions::Distribution;
    use candle_core::{DType, Device, Result, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn build_dist(obs_size: usize, action_size: usize) -> Result<DiagGaussianDistribution> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        DiagGaussianDistribution::build(obs_size, action_size, &[16, action_size], &vb, "policy")
    }

    #[test]
    fn sampled_logp_matches_log_probs() -> Result<()> {
        let dist = build_dist(3, 2)?;
        let obs = Tensor::ones((1, 3), DType::F32, &Device::Cpu)?;
        let (action, logp) = dist.get_action(&obs)?;
        assert_eq!(action.dims(), &[2]);
        let batch_logp = dist
            .log_probs(&obs, &action.unsqueeze(0)?)?
            .squeeze(0)?
            .to_scalar::<f32>()?;
        assert!((batch_logp - logp.to_scalar::<f32>()?).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn entropy_has_batch_shape() -> Result<()> {
        let dist = build_dist(3, 2)?;
        let obs = Tensor::zeros((4, 3), DType::F32, &Device::Cpu)?;
        let entropy: Vec<f32> = dist.entropy(&obs)?.to_vec1()?;
        assert_eq!(entropy.len(), 4);
        assert!(entropy.iter().all(|e| e.is_finite()));
        Ok(())
    }
}
