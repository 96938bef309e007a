use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder, linear};

#[derive(Debug, Clone)]
enum MlpLayer {
    Linear(Linear),
    Activation(Activation),
}

impl Module for MlpLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Linear(layer) => layer.forward(xs),
            Self::Activation(activation) => activation.forward(xs),
        }
    }
}

/// A Linear/ReLU stack. `candle_nn::Sequential` boxes its layers, which
/// loses `Send + Sync`; worker threads share policies by reference, so the
/// layers are kept as plain structs instead.
#[derive(Debug, Clone, Default)]
pub struct MlpNet {
    layers: Vec<MlpLayer>,
}

impl Module for MlpNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?;
        }
        Ok(xs)
    }
}

/// Builds an MLP with ReLU between the layers and a linear output. `layers`
/// already includes the output dimension.
pub fn build_mlp(
    input_dim: usize,
    layers: &[usize],
    vb: &VarBuilder,
    prefix: &str,
) -> Result<MlpNet> {
    let mut last_dim = input_dim;
    let mut net = MlpNet::default();
    let num_layers = layers.len();
    for (layer_idx, layer_size) in layers.iter().enumerate() {
        let layer_pp = format!("{prefix}{layer_idx}");
        net.layers
            .push(MlpLayer::Linear(linear(last_dim, *layer_size, vb.pp(layer_pp))?));
        if layer_idx != num_layers - 1 {
            net.layers.push(MlpLayer::Activation(Activation::Relu));
        }
        last_dim = *layer_size;
    }
    Ok(net)
}

#[cfg(test)]
mod test {
    use super::build_mlp;
    use candle_core::{DType, Device, Result, Tensor};
    use candle_nn::{Module, VarBuilder, VarMap};

    #[test]
    fn mlp_output_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = build_mlp(4, &[8, 8, 2], &vb, "policy")?;
        let input = Tensor::zeros((3, 4), DType::F32, &device)?;
        let output = net.forward(&input)?;
        assert_eq!(output.dims(), &[3, 2]);
        Ok(())
    }
}
