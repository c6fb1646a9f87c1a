//! Inference-only building blocks for the classifier.
//!
//! Feature maps are `(channels, height, width)` arrays; the batch dimension
//! is stripped before the first layer since only one face is ever scored.

use ndarray::{
    s, Array1, Array2, Array3, Array4, ArrayBase, ArrayView1, ArrayView3, Axis, Data, Dimension,
};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// PyTorch's default `BatchNorm2d` epsilon.
pub const BATCH_NORM_EPS: f32 = 1e-5;

/// 3x3 convolution, stride 1, zero padding 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    /// `[out_channels, in_channels, 3, 3]`
    pub weight: Array4<f32>,
    /// `[out_channels]`
    pub bias: Array1<f32>,
}

impl Conv2d {
    pub fn forward(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (channels, height, width) = input.dim();
        let out_channels = self.weight.len_of(Axis(0));

        let mut padded = Array3::<f32>::zeros((channels, height + 2, width + 2));
        padded
            .slice_mut(s![.., 1..height + 1, 1..width + 1])
            .assign(&input);

        // im2col: one row per (channel, ky, kx) tap, one column per output pixel.
        let mut columns = Array2::<f32>::zeros((channels * 9, height * width));
        for c in 0..channels {
            for ky in 0..3 {
                for kx in 0..3 {
                    let window = padded.slice(s![c, ky..ky + height, kx..kx + width]);
                    columns
                        .row_mut(c * 9 + ky * 3 + kx)
                        .into_shape((height, width))?
                        .assign(&window);
                }
            }
        }

        let kernel = self.weight.view().into_shape((out_channels, channels * 9))?;
        let mut output = kernel.dot(&columns);
        output += &self.bias.view().insert_axis(Axis(1));

        Ok(output.into_shape((out_channels, height, width))?)
    }

    pub(crate) fn check(&self, name: &str, in_channels: usize, out_channels: usize) -> Result<()> {
        check_param(
            &format!("{name}.weight"),
            &self.weight,
            &[out_channels, in_channels, 3, 3],
        )?;
        check_param(&format!("{name}.bias"), &self.bias, &[out_channels])
    }
}

/// Batch normalization in inference mode, using the stored running statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm2d {
    pub weight: Array1<f32>,
    pub bias: Array1<f32>,
    pub running_mean: Array1<f32>,
    pub running_var: Array1<f32>,
}

impl BatchNorm2d {
    pub fn forward_inplace(&self, features: &mut Array3<f32>) {
        for (c, mut plane) in features.outer_iter_mut().enumerate() {
            let scale = self.weight[c] / (self.running_var[c] + BATCH_NORM_EPS).sqrt();
            let shift = self.bias[c] - self.running_mean[c] * scale;
            plane.mapv_inplace(|v| v * scale + shift);
        }
    }

    pub(crate) fn check(&self, name: &str, channels: usize) -> Result<()> {
        for (param, values) in [
            ("weight", &self.weight),
            ("bias", &self.bias),
            ("running_mean", &self.running_mean),
            ("running_var", &self.running_var),
        ] {
            check_param(&format!("{name}.{param}"), values, &[channels])?;
        }
        if self.running_var.iter().any(|v| *v < 0.0) {
            return Err(ModelError::InvalidModel(format!(
                "{name}.running_var contains negative entries"
            ))
            .into());
        }
        Ok(())
    }
}

/// Fully connected projection `y = W x + b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    /// `[out_features, in_features]`
    pub weight: Array2<f32>,
    /// `[out_features]`
    pub bias: Array1<f32>,
}

impl Linear {
    pub fn forward(&self, input: ArrayView1<f32>) -> Array1<f32> {
        self.weight.dot(&input) + &self.bias
    }

    pub(crate) fn check(&self, name: &str, in_features: usize, out_features: usize) -> Result<()> {
        check_param(
            &format!("{name}.weight"),
            &self.weight,
            &[out_features, in_features],
        )?;
        check_param(&format!("{name}.bias"), &self.bias, &[out_features])
    }
}

pub fn relu_inplace<D: Dimension>(features: &mut ndarray::Array<f32, D>) {
    features.mapv_inplace(|v| v.max(0.0));
}

/// 2x2 max pooling with stride 2; odd trailing rows/columns are dropped.
pub fn max_pool2x2(features: &Array3<f32>) -> Array3<f32> {
    let (channels, height, width) = features.dim();
    Array3::from_shape_fn((channels, height / 2, width / 2), |(c, y, x)| {
        let (y0, x0) = (2 * y, 2 * x);
        features[[c, y0, x0]]
            .max(features[[c, y0, x0 + 1]])
            .max(features[[c, y0 + 1, x0]])
            .max(features[[c, y0 + 1, x0 + 1]])
    })
}

/// A parameter must have exactly the expected shape and hold only finite values.
fn check_param<S, D>(name: &str, values: &ArrayBase<S, D>, expected: &[usize]) -> Result<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let actual = values.shape();
    if actual != expected {
        return Err(ModelError::InvalidModel(format!(
            "{name}: expected shape {expected:?}, got {actual:?}"
        ))
        .into());
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidModel(format!("{name} contains non-finite values")).into());
    }
    Ok(())
}
