//! Pluggable projection: classical affine map or quantum circuit
//!
//! The strategy is fixed when the projection is built. Call sites never
//! branch on whether a circuit is present; they hold a [`Projection`] and
//! call [`Projection::forward`].

use burn::module::Param;
use burn::nn::Linear;
use burn::prelude::*;

use crate::error::ModelError;
use crate::init::ParamInit;
use crate::quantum::{QuantumCircuitFactory, QuantumLayer};

/// A width-`W` to width-`W'` transform
///
/// - `Classical`: `y = xA + b`, any output width
/// - `Quantum`: `y = circuit(x; θ)`, output width equals input width
#[derive(Module, Debug)]
pub enum Projection<B: Backend> {
    Classical(Linear<B>),
    Quantum(QuantumLayer<B>),
}

impl<B: Backend> Projection<B> {
    /// Affine map with LeCun-normal weights and zero bias
    pub fn classical(
        d_input: usize,
        d_output: usize,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Self {
        Self::Classical(dense(d_input, d_output, init, device))
    }

    /// Circuit-backed map over `width` qubits
    pub fn quantum(
        site: &'static str,
        width: usize,
        factory: &dyn QuantumCircuitFactory<B>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        QuantumLayer::new(site, width, factory, init, device).map(Self::Quantum)
    }

    /// Picks the quantum strategy when a factory is given, classical otherwise
    ///
    /// A quantum projection cannot change width, so `d_input != d_output`
    /// with a factory fails with [`ModelError::QuantumWidth`].
    pub fn select(
        site: &'static str,
        d_input: usize,
        d_output: usize,
        factory: Option<&dyn QuantumCircuitFactory<B>>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        match factory {
            None => Ok(Self::classical(d_input, d_output, init, device)),
            Some(_) if d_input != d_output => Err(ModelError::QuantumWidth {
                site,
                expected: d_input,
                actual: d_output,
            }),
            Some(factory) => Self::quantum(site, d_input, factory, init, device),
        }
    }

    pub fn is_quantum(&self) -> bool {
        matches!(self, Self::Quantum(_))
    }

    /// Output width
    pub fn d_output(&self) -> usize {
        match self {
            Self::Classical(linear) => linear.weight.dims()[1],
            Self::Quantum(layer) => layer.num_qubits,
        }
    }

    /// `x`: `[batch, seq_len, d_input]` -> `[batch, seq_len, d_output]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>, ModelError> {
        match self {
            Self::Classical(linear) => {
                let [_batch, _seq_len, width] = x.dims();
                let [d_input, _] = linear.weight.dims();
                if width != d_input {
                    return Err(ModelError::shape(format!(
                        "projection expects width {d_input}, got {width}"
                    )));
                }
                Ok(linear.forward(x))
            }
            Self::Quantum(layer) => layer.forward(x),
        }
    }
}

/// Builds a `burn::nn::Linear` with seeded LeCun-normal weights and zero bias
pub fn dense<B: Backend>(
    d_input: usize,
    d_output: usize,
    init: &mut ParamInit,
    device: &B::Device,
) -> Linear<B> {
    Linear {
        weight: Param::from_tensor(init.lecun_normal([d_input, d_output], d_input, device)),
        bias: Some(Param::from_tensor(Tensor::zeros([d_output], device))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::tests::cosine_factory;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_classical_changes_width() {
        let device = Default::default();
        let proj = Projection::<TestBackend>::classical(8, 16, &mut ParamInit::new(0), &device);

        assert!(!proj.is_quantum());
        assert_eq!(proj.d_output(), 16);

        let x = Tensor::zeros([2, 5, 8], &device);
        assert_eq!(proj.forward(x).unwrap().dims(), [2, 5, 16]);
    }

    #[test]
    fn test_classical_and_quantum_are_shape_interchangeable() {
        let device = Default::default();
        let factory = cosine_factory::<TestBackend>();
        let mut init = ParamInit::new(0);

        let classical = Projection::select("test", 8, 8, None, &mut init, &device).unwrap();
        let quantum =
            Projection::select("test", 8, 8, Some(factory.as_ref()), &mut init, &device).unwrap();
        assert!(quantum.is_quantum());

        let x = Tensor::<TestBackend, 3>::ones([2, 5, 8], &device);
        let a = classical.forward(x.clone()).unwrap();
        let b = quantum.forward(x).unwrap();
        assert_eq!(a.dims(), b.dims());
    }

    #[test]
    fn test_quantum_rejects_width_change() {
        let device = Default::default();
        let factory = cosine_factory::<TestBackend>();
        let err = Projection::select(
            "feed_forward",
            8,
            16,
            Some(factory.as_ref()),
            &mut ParamInit::new(0),
            &device,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ModelError::QuantumWidth {
                site: "feed_forward",
                expected: 8,
                actual: 16
            }
        );
    }

    #[test]
    fn test_classical_rejects_wrong_input_width() {
        let device = Default::default();
        let proj = Projection::<TestBackend>::classical(8, 8, &mut ParamInit::new(0), &device);

        let x = Tensor::zeros([1, 2, 4], &device);
        assert!(matches!(proj.forward(x), Err(ModelError::Shape(_))));
    }

    #[test]
    fn test_dense_bias_starts_at_zero() {
        let device = Default::default();
        let linear = dense::<TestBackend>(4, 3, &mut ParamInit::new(0), &device);

        let bias: Vec<f32> = linear.bias.unwrap().val().into_data().to_vec().unwrap();
        assert_eq!(bias, vec![0.0; 3]);
    }

    #[test]
    fn test_dense_weights_come_from_initializer() {
        let device = Default::default();
        let linear = dense::<TestBackend>(4, 3, &mut ParamInit::new(9), &device);
        let expected: Tensor<TestBackend, 2> = ParamInit::new(9).lecun_normal([4, 3], 4, &device);

        assert_eq!(
            linear.weight.val().into_data().to_vec::<f32>().unwrap(),
            expected.into_data().to_vec::<f32>().unwrap()
        );
    }
}
