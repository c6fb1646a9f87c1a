use ndarray::{Array1, Array2, Array4, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::layers::{max_pool2x2, relu_inplace, BatchNorm2d, Conv2d, Linear};
use crate::normalizer::NormalizedFace;
use crate::types::{EmotionLabel, Logits};

/// Channel widths of the three convolution blocks, input first.
pub const CHANNELS: [usize; 4] = [1, 64, 128, 256];
/// Spatial side length after three 2x2 pools of a 48x48 input.
pub const POOLED_SIZE: usize = 6;
/// Length of the flattened feature vector fed to `fc1`.
pub const FLATTENED: usize = 256 * POOLED_SIZE * POOLED_SIZE;
pub const HIDDEN: usize = 512;

/// Every learned parameter of the emotion CNN, as one flat record.
///
/// Field names follow the PyTorch state-dict keys the weights were exported
/// from (`conv1.weight`, `bn1.running_mean`, ...).
///
/// ```text
/// [conv 3x3 -> batchnorm -> relu -> maxpool 2x2] x3   1 -> 64 -> 128 -> 256 channels
/// flatten (9216) -> fc1 (512) -> relu -> dropout -> fc2 (7)
/// ```
///
/// Dropout is an identity at inference time and has no parameters, so it
/// does not appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionNet {
    pub conv1: Conv2d,
    pub bn1: BatchNorm2d,
    pub conv2: Conv2d,
    pub bn2: BatchNorm2d,
    pub conv3: Conv2d,
    pub bn3: BatchNorm2d,
    pub fc1: Linear,
    pub fc2: Linear,
}

impl EmotionNet {
    /// Build a correctly shaped network from a per-parameter initializer.
    ///
    /// `init` receives the state-dict name of the parameter and the flat
    /// (row-major) index of the element being filled.
    pub fn from_fn<F>(mut init: F) -> Self
    where
        F: FnMut(&str, usize) -> f32,
    {
        let mut conv = |name: &str, cin: usize, cout: usize| {
            let weight_name = format!("{name}.weight");
            let bias_name = format!("{name}.bias");
            Conv2d {
                weight: filled4(&weight_name, (cout, cin, 3, 3), &mut init),
                bias: filled1(&bias_name, cout, &mut init),
            }
        };
        let conv1 = conv("conv1", CHANNELS[0], CHANNELS[1]);
        let conv2 = conv("conv2", CHANNELS[1], CHANNELS[2]);
        let conv3 = conv("conv3", CHANNELS[2], CHANNELS[3]);

        let mut bn = |name: &str, channels: usize| BatchNorm2d {
            weight: filled1(&format!("{name}.weight"), channels, &mut init),
            bias: filled1(&format!("{name}.bias"), channels, &mut init),
            running_mean: filled1(&format!("{name}.running_mean"), channels, &mut init),
            running_var: filled1(&format!("{name}.running_var"), channels, &mut init),
        };
        let bn1 = bn("bn1", CHANNELS[1]);
        let bn2 = bn("bn2", CHANNELS[2]);
        let bn3 = bn("bn3", CHANNELS[3]);

        let mut linear = |name: &str, inputs: usize, outputs: usize| Linear {
            weight: filled2(&format!("{name}.weight"), (outputs, inputs), &mut init),
            bias: filled1(&format!("{name}.bias"), outputs, &mut init),
        };
        let fc1 = linear("fc1", FLATTENED, HIDDEN);
        let fc2 = linear("fc2", HIDDEN, EmotionLabel::COUNT);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            fc1,
            fc2,
        }
    }

    /// Check every parameter against the fixed architecture.
    pub fn validate(&self) -> Result<()> {
        self.conv1.check("conv1", CHANNELS[0], CHANNELS[1])?;
        self.bn1.check("bn1", CHANNELS[1])?;
        self.conv2.check("conv2", CHANNELS[1], CHANNELS[2])?;
        self.bn2.check("bn2", CHANNELS[2])?;
        self.conv3.check("conv3", CHANNELS[2], CHANNELS[3])?;
        self.bn3.check("bn3", CHANNELS[3])?;
        self.fc1.check("fc1", FLATTENED, HIDDEN)?;
        self.fc2.check("fc2", HIDDEN, EmotionLabel::COUNT)
    }

    /// `(state-dict name, shape)` for every parameter, in forward order.
    pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.parameters()
            .into_iter()
            .map(|(name, values)| (name, values.shape().to_vec()))
            .collect()
    }

    /// Every parameter tensor with its state-dict name, in forward order.
    pub fn parameters(&self) -> Vec<(String, ArrayViewD<'_, f32>)> {
        let mut out = Vec::with_capacity(26);

        for (name, conv) in [
            ("conv1", &self.conv1),
            ("conv2", &self.conv2),
            ("conv3", &self.conv3),
        ] {
            out.push((format!("{name}.weight"), conv.weight.view().into_dyn()));
            out.push((format!("{name}.bias"), conv.bias.view().into_dyn()));
        }
        for (name, bn) in [("bn1", &self.bn1), ("bn2", &self.bn2), ("bn3", &self.bn3)] {
            out.push((format!("{name}.weight"), bn.weight.view().into_dyn()));
            out.push((format!("{name}.bias"), bn.bias.view().into_dyn()));
            out.push((format!("{name}.running_mean"), bn.running_mean.view().into_dyn()));
            out.push((format!("{name}.running_var"), bn.running_var.view().into_dyn()));
        }
        for (name, fc) in [("fc1", &self.fc1), ("fc2", &self.fc2)] {
            out.push((format!("{name}.weight"), fc.weight.view().into_dyn()));
            out.push((format!("{name}.bias"), fc.bias.view().into_dyn()));
        }

        out
    }

    /// Run the network on one normalized face and return the raw class scores.
    ///
    /// Pure and deterministic: the same weights and face always give the
    /// same logits.
    pub fn forward(&self, face: &NormalizedFace) -> Result<Logits> {
        self.validate()?;

        let input = face.tensor().index_axis(Axis(0), 0);

        let mut x = self.conv1.forward(input)?;
        self.bn1.forward_inplace(&mut x);
        relu_inplace(&mut x);
        let x = max_pool2x2(&x);

        let mut x = self.conv2.forward(x.view())?;
        self.bn2.forward_inplace(&mut x);
        relu_inplace(&mut x);
        let x = max_pool2x2(&x);

        let mut x = self.conv3.forward(x.view())?;
        self.bn3.forward_inplace(&mut x);
        relu_inplace(&mut x);
        let x = max_pool2x2(&x);
        trace!(shape = ?x.dim(), "convolution features");

        let flat = x.into_shape(FLATTENED)?;
        let mut hidden = self.fc1.forward(flat.view());
        relu_inplace(&mut hidden);
        // dropout: identity at inference
        let scores = self.fc2.forward(hidden.view());

        let mut logits = [0.0f32; EmotionLabel::COUNT];
        for (slot, score) in logits.iter_mut().zip(scores.iter()) {
            *slot = *score;
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteScores(logits));
        }
        Ok(logits)
    }
}

fn filled1<F: FnMut(&str, usize) -> f32>(name: &str, len: usize, init: &mut F) -> Array1<f32> {
    Array1::from_iter((0..len).map(|i| init(name, i)))
}

fn filled2<F: FnMut(&str, usize) -> f32>(
    name: &str,
    shape: (usize, usize),
    init: &mut F,
) -> Array2<f32> {
    let mut index = 0;
    Array2::from_shape_simple_fn(shape, || {
        let v = init(name, index);
        index += 1;
        v
    })
}

fn filled4<F: FnMut(&str, usize) -> f32>(
    name: &str,
    shape: (usize, usize, usize, usize),
    init: &mut F,
) -> Array4<f32> {
    let mut index = 0;
    Array4::from_shape_simple_fn(shape, || {
        let v = init(name, index);
        index += 1;
        v
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::grayscale::GrayImage;
    use crate::normalizer::normalize_gray;
    use crate::types::FaceRegion;

    /// Small deterministic pseudo-random weights with sane batch-norm stats.
    pub(crate) fn synthetic_net() -> EmotionNet {
        EmotionNet::from_fn(|name, i| {
            let h = (i as u32)
                .wrapping_mul(2_654_435_761)
                .wrapping_add(name.len() as u32 * 97);
            let unit = (h >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
            if name.ends_with("running_var") {
                1.0 + unit.abs()
            } else if name.starts_with("bn") && name.ends_with(".weight") {
                1.0
            } else if name.starts_with("fc1") {
                unit * 0.02
            } else {
                unit * 0.2
            }
        })
    }

    fn sample_face() -> NormalizedFace {
        let gray = GrayImage::from_fn(60, 60, |x, y| ((x * 3 + y * 5) % 256) as u8);
        normalize_gray(&gray, FaceRegion::new(6, 6, 48, 48)).unwrap()
    }

    #[test]
    fn from_fn_matches_architecture() {
        let net = synthetic_net();
        net.validate().unwrap();

        let shapes = net.parameter_shapes();
        assert_eq!(shapes.len(), 26);
        assert_eq!(shapes[0], ("conv1.weight".to_string(), vec![64, 1, 3, 3]));
        assert!(shapes.contains(&("fc1.weight".to_string(), vec![512, 9216])));
        assert_eq!(shapes[25], ("fc2.bias".to_string(), vec![7]));
    }

    #[test]
    fn forward_is_deterministic_and_finite() {
        let net = synthetic_net();
        let face = sample_face();

        let first = net.forward(&face).unwrap();
        let second = net.forward(&face).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_weights_yield_output_bias() {
        let net = EmotionNet::from_fn(|name, i| match name {
            "fc2.bias" => i as f32,
            n if n.ends_with("running_var") => 1.0,
            _ => 0.0,
        });
        let logits = net.forward(&sample_face()).unwrap();
        assert_eq!(logits, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn overflow_inside_the_network_is_an_error() {
        // Finite but huge weights overflow f32 once activations are summed.
        let net = EmotionNet::from_fn(|name, _| match name {
            n if n.ends_with("running_var") => 1.0,
            n if n.starts_with("bn") => 0.0,
            "fc1.bias" => 1.0,
            "fc2.weight" => f32::MAX,
            _ => 0.0,
        });
        net.validate().unwrap();

        let err = net.forward(&sample_face()).unwrap_err();
        assert!(matches!(err, Error::NonFiniteScores(_)), "{err}");
    }

    #[test]
    fn forward_rejects_mismatched_shapes() {
        let mut net = synthetic_net();
        net.fc1.weight = Array2::zeros((HIDDEN, 100));
        let err = net.forward(&sample_face()).unwrap_err();
        assert!(err.to_string().contains("fc1.weight"));
    }
}
