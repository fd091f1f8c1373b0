//! Seeded parameter initialization
//!
//! Every random learnable tensor in a model is drawn from a single
//! [`ParamInit`] in a fixed order, so a `(config, seed)` pair always
//! reproduces the same parameters. Constant tensors (biases, norm scales,
//! the class token) come from `Tensor::zeros`/`Tensor::ones`. Normal samples
//! use the Box-Muller transform.

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic source of initial parameter values
pub struct ParamInit {
    rng: StdRng,
}

impl ParamInit {
    /// Creates an initializer seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample_normal(&mut self, numel: usize, mean: f64, std: f64) -> Vec<f32> {
        (0..numel)
            .map(|_| {
                let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = self.rng.gen_range(0.0..1.0);
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                (mean + std * z) as f32
            })
            .collect()
    }

    /// Normal distribution N(0, std)
    pub fn normal<B: Backend, const D: usize>(
        &mut self,
        shape: [usize; D],
        std: f64,
        device: &B::Device,
    ) -> Tensor<B, D> {
        let numel = shape.iter().product();
        let values = self.sample_normal(numel, 0.0, std);
        Tensor::from_data(TensorData::new(values, shape), device)
    }

    /// LeCun normal: std = sqrt(1 / fan_in)
    ///
    /// Used for dense and patch-projection kernels.
    pub fn lecun_normal<B: Backend, const D: usize>(
        &mut self,
        shape: [usize; D],
        fan_in: usize,
        device: &B::Device,
    ) -> Tensor<B, D> {
        let std = (1.0 / fan_in.max(1) as f64).sqrt();
        self.normal(shape, std, device)
    }

    /// Xavier normal: std = sqrt(2 / (fan_in + fan_out))
    ///
    /// For a 2D shape `[rows, cols]`, fan_in is `rows` and fan_out is `cols`.
    pub fn xavier_normal<B: Backend>(&mut self, shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
        let [fan_in, fan_out] = shape;
        let std = (2.0 / (fan_in + fan_out).max(1) as f64).sqrt();
        self.normal(shape, std, device)
    }
}
