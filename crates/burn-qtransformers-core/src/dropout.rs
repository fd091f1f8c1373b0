//! Dropout driven by an explicit random stream
//!
//! Dropout never touches global RNG state. Training-mode calls draw their
//! masks from a [`RandomStream`] that the caller seeds per invocation, so two
//! training passes with the same seed produce the same masks and evaluation
//! passes are bit-for-bit reproducible.

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Caller-owned source of dropout randomness
pub struct RandomStream {
    rng: StdRng,
}

impl RandomStream {
    /// Creates a stream seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Samples an inverted-dropout mask of `numel` entries
    ///
    /// Each entry is `0` with probability `rate` and `1 / (1 - rate)` otherwise.
    fn keep_mask(&mut self, numel: usize, rate: f64) -> Vec<f32> {
        let scale = (1.0 / (1.0 - rate)) as f32;
        (0..numel)
            .map(|_| if self.rng.gen::<f64>() < rate { 0.0 } else { scale })
            .collect()
    }
}

/// Evaluation flag threaded through every forward call
///
/// `Deterministic` disables dropout. `Training` carries the stream that
/// dropout masks are drawn from.
pub enum ForwardMode<'a> {
    Deterministic,
    Training(&'a mut RandomStream),
}

impl<'a> ForwardMode<'a> {
    pub fn training(stream: &'a mut RandomStream) -> Self {
        Self::Training(stream)
    }
}

/// Inverted dropout with a fixed rate
#[derive(Module, Clone, Debug)]
pub struct Dropout {
    /// Probability of zeroing an element
    pub rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Applies dropout in training mode, identity otherwise
    pub fn forward<B: Backend, const D: usize>(
        &self,
        x: Tensor<B, D>,
        mode: &mut ForwardMode<'_>,
    ) -> Tensor<B, D> {
        let stream = match mode {
            ForwardMode::Training(stream) if self.rate > 0.0 => stream,
            _ => return x,
        };

        let dims = x.dims();
        let numel = dims.iter().product();
        let mask = stream.keep_mask(numel, self.rate);
        let mask = Tensor::<B, D>::from_data(TensorData::new(mask, dims), &x.device());

        x * mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_deterministic_is_identity() {
        let device = Default::default();
        let dropout = Dropout::new(0.5);
        let x: Tensor<TestBackend, 2> = Tensor::ones([4, 8], &device);

        let y = dropout.forward(x, &mut ForwardMode::Deterministic);
        assert_eq!(y.into_data().to_vec::<f32>().unwrap(), vec![1.0; 32]);
    }

    #[test]
    fn test_zero_rate_is_identity_in_training() {
        let device = Default::default();
        let dropout = Dropout::new(0.0);
        let x: Tensor<TestBackend, 2> = Tensor::ones([4, 8], &device);

        let mut stream = RandomStream::new(0);
        let y = dropout.forward(x, &mut ForwardMode::training(&mut stream));
        assert_eq!(y.into_data().to_vec::<f32>().unwrap(), vec![1.0; 32]);
    }

    #[test]
    fn test_training_mask_is_inverted() {
        let device = Default::default();
        let dropout = Dropout::new(0.5);
        let x: Tensor<TestBackend, 1> = Tensor::ones([256], &device);

        let mut stream = RandomStream::new(11);
        let y = dropout.forward(x, &mut ForwardMode::training(&mut stream));
        let values: Vec<f32> = y.into_data().to_vec().unwrap();

        assert!(values.iter().all(|&v| v == 0.0 || v == 2.0));
        let dropped = values.iter().filter(|&&v| v == 0.0).count();
        assert!(dropped > 64 && dropped < 192, "dropped {dropped}");
    }

    #[test]
    fn test_same_seed_same_mask() {
        let device = Default::default();
        let dropout = Dropout::new(0.3);
        let x: Tensor<TestBackend, 2> = Tensor::ones([8, 8], &device);

        let mut s1 = RandomStream::new(5);
        let mut s2 = RandomStream::new(5);
        let a = dropout.forward(x.clone(), &mut ForwardMode::training(&mut s1));
        let b = dropout.forward(x, &mut ForwardMode::training(&mut s2));

        assert_eq!(
            a.into_data().to_vec::<f32>().unwrap(),
            b.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_different_seed_different_mask() {
        let device = Default::default();
        let dropout = Dropout::new(0.3);
        let x: Tensor<TestBackend, 2> = Tensor::ones([8, 8], &device);

        let mut s1 = RandomStream::new(5);
        let mut s2 = RandomStream::new(6);
        let a = dropout.forward(x.clone(), &mut ForwardMode::training(&mut s1));
        let b = dropout.forward(x, &mut ForwardMode::training(&mut s2));

        assert_ne!(
            a.into_data().to_vec::<f32>().unwrap(),
            b.into_data().to_vec::<f32>().unwrap()
        );
    }
}
