use super::Distribution;
use crate::network::{MlpNet, build_mlp};
use crate::rng;
use candle_core::{Device, Error, IndexOp, Result, Tensor};
use candle_nn::{
    Module, VarBuilder,
    ops::{log_softmax, softmax},
};
use rand::distr::Distribution as RandDistribution;
use rand::distr::weighted::WeightedIndex;

/// Discrete action distribution. Actions are one-hot encoded so that every
/// action tensor in a rollout has the same f32 layout.
#[derive(Debug)]
pub struct CategoricalDistribution {
    action_size: usize,
    logits: MlpNet,
    device: Device,
}

impl CategoricalDistribution {
    pub fn new(action_size: usize, logits: MlpNet, device: Device) -> Self {
        Self {
            action_size,
            logits,
            device,
        }
    }

    pub fn build(
        input_dim: usize,
        action_size: usize,
        layers: &[usize],
        vb: &VarBuilder,
        device: Device,
        prefix: &str,
    ) -> Result<Self> {
        let logits = build_mlp(input_dim, layers, vb, prefix)?;
        Ok(Self {
            action_size,
            logits,
            device,
        })
    }
}

impl Distribution for CategoricalDistribution {
    fn get_action(&self, observation: &Tensor) -> Result<(Tensor, Tensor)> {
        let logits = self.logits.forward(observation)?;
        let action_probs: Vec<f32> = softmax(&logits, 1)?.squeeze(0)?.to_vec1()?;
        let weights = WeightedIndex::new(&action_probs).map_err(Error::wrap)?;
        let action_idx = rng::with_rng(|rng| weights.sample(rng));
        let logp = log_softmax(&logits, 1)?.squeeze(0)?.i(action_idx)?;
        let mut one_hot = vec![0f32; self.action_size];
        one_hot[action_idx] = 1.;
        let action = Tensor::from_vec(one_hot, self.action_size, &self.device)?.detach();
        Ok((action, logp))
    }

    fn log_probs(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let logits = self.logits.forward(states)?;
        let log_probs = log_softmax(&logits, 1)?;
        actions.mul(&log_probs)?.sum(1)
    }

    fn entropy(&self, states: &Tensor) -> Result<Tensor> {
        let logits = self.logits.forward(states)?;
        let log_probs = log_softmax(&logits, 1)?;
        let probs = softmax(&logits, 1)?;
        probs.mul(&log_probs)?.sum(1)?.neg()
    }
}

#[cfg(test)]
mod test {
    use super::CategoricalDistribution;
    use crate::distributions::Distribution;
    use candle_core::{DType, Device, Result, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn build_dist(obs_size: usize, action_size: usize) -> Result<CategoricalDistribution> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        CategoricalDistribution::build(
            obs_size,
            action_size,
            &[16, action_size],
            &vb,
            device,
            "policy",
        )
    }

    #[test]
    fn sampled_action_is_one_hot() -> Result<()> {
        let dist = build_dist(4, 3)?;
        let obs = Tensor::ones((1, 4), DType::F32, &Device::Cpu)?;
        let (action, logp) = dist.get_action(&obs)?;
        let action: Vec<f32> = action.to_vec1()?;
        assert_eq!(action.len(), 3);
        assert_eq!(action.iter().sum::<f32>(), 1.);
        assert!(action.iter().all(|x| *x == 0. || *x == 1.));
        assert!(logp.to_scalar::<f32>()? <= 0.);
        Ok(())
    }

    #[test]
    fn sampled_logp_matches_log_probs() -> Result<()> {
        let dist = build_dist(4, 3)?;
        let obs = Tensor::ones((1, 4), DType::F32, &Device::Cpu)?;
        let (action, logp) = dist.get_action(&obs)?;
        let batch_logp = dist
            .log_probs(&obs, &action.unsqueeze(0)?)?
            .squeeze(0)?
            .to_scalar::<f32>()?;
        assert!((batch_logp - logp.to_scalar::<f32>()?).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn entropy_is_bounded_by_uniform() -> Result<()> {
        let dist = build_dist(4, 3)?;
        let obs = Tensor::ones((2, 4), DType::F32, &Device::Cpu)?;
        let entropy: Vec<f32> = dist.entropy(&obs)?.to_vec1()?;
        assert_eq!(entropy.len(), 2);
        for e in entropy {
            assert!(e >= 0.);
            assert!(e <= (3f32).ln() + 1e-5);
        }
        Ok(())
    }
}
