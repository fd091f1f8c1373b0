//! Layer normalization
//!
//! Normalizes across the last dimension of the input tensor, as used before
//! every sublayer and after the final transformer block.

use burn::module::Param;
use burn::prelude::*;

/// Layer normalization module
///
/// Normalizes inputs across the last dimension, then applies a learned
/// affine transformation (scale and shift).
///
/// # Formula
///
/// For input x with last dimension of size D:
/// ```text
/// y = (x - mean(x)) / sqrt(var(x) + eps) * weight + bias
/// ```
///
/// `var` is the population variance.
#[derive(Module, Debug)]
pub struct LayerNorm<B: Backend> {
    /// Scale parameter
    pub weight: Param<Tensor<B, 1>>,
    /// Shift parameter
    pub bias: Param<Tensor<B, 1>>,
    /// Epsilon for numerical stability
    pub eps: f64,
}

impl<B: Backend> LayerNorm<B> {
    /// Creates a layer norm with unit scale and zero shift
    pub fn new(size: usize, device: &B::Device) -> Self {
        Self {
            weight: Param::from_tensor(Tensor::ones([size], device)),
            bias: Param::from_tensor(Tensor::zeros([size], device)),
            eps: 1e-6,
        }
    }

    /// Normalized width
    pub fn size(&self) -> usize {
        let [size] = self.weight.dims();
        size
    }

    /// Applies layer normalization to the input tensor
    ///
    /// Output has the same shape as the input.
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let last_dim = D - 1;
        let (var, mean) = x.clone().var_mean_bias(last_dim);

        let x_norm = (x - mean) / (var + self.eps).sqrt();

        x_norm * self.weight.val().unsqueeze() + self.bias.val().unsqueeze()
    }
}
