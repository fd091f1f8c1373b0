//! Quantum circuit capability boundary
//!
//! Circuit construction lives outside this crate. A circuit is consumed as
//! an opaque, differentiable transform over `num_qubits`-wide rows, built on
//! demand by a [`QuantumCircuitFactory`] keyed by qubit count. This module
//! only owns the learned circuit weights and the reshaping around the call.

use std::fmt;
use std::sync::Arc;

use burn::module::{
    AutodiffModule, Content, ConstantRecord, Devices, ModuleDisplay, ModuleDisplayDefault,
    ModuleMapper, ModuleVisitor, Param,
};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::ModelError;
use crate::init::ParamInit;

/// A parameterized circuit over a fixed number of qubits
///
/// Implementations must map `[rows, num_qubits]` to `[rows, num_qubits]`
/// and must not keep state between calls. Implement it generically over the
/// backend so the circuit can follow a model through [`AutodiffModule::valid`].
pub trait QuantumCircuit<B: Backend>: fmt::Debug + Send + Sync {
    /// Input and output width
    fn num_qubits(&self) -> usize;

    /// Shape of the learned weights the circuit consumes
    fn weight_shape(&self) -> [usize; 2];

    /// Evaluates the circuit on every row of `inputs`
    fn forward(&self, inputs: Tensor<B, 2>, weights: Tensor<B, 2>) -> Tensor<B, 2>;

    /// The same circuit on the inner (gradient-free) backend
    fn valid(&self) -> Arc<dyn QuantumCircuit<B::InnerBackend>>
    where
        B: AutodiffBackend;
}

/// Builds circuits for a requested qubit count
pub trait QuantumCircuitFactory<B: Backend>: Send + Sync {
    fn build(&self, num_qubits: usize) -> Arc<dyn QuantumCircuit<B>>;
}

impl<B, F> QuantumCircuitFactory<B> for F
where
    B: Backend,
    F: Fn(usize) -> Arc<dyn QuantumCircuit<B>> + Send + Sync,
{
    fn build(&self, num_qubits: usize) -> Arc<dyn QuantumCircuit<B>> {
        self(num_qubits)
    }
}

/// Which sublayers are backed by quantum circuits
///
/// Selected once at model construction. `attention` replaces the query, key,
/// value and output projections; `mlp` replaces the first feed-forward stage.
pub struct QuantumCircuits<B: Backend> {
    pub attention: Option<Arc<dyn QuantumCircuitFactory<B>>>,
    pub mlp: Option<Arc<dyn QuantumCircuitFactory<B>>>,
}

impl<B: Backend> QuantumCircuits<B> {
    /// All projections classical
    pub fn classical() -> Self {
        Self {
            attention: None,
            mlp: None,
        }
    }

    pub fn with_attention(mut self, factory: Arc<dyn QuantumCircuitFactory<B>>) -> Self {
        self.attention = Some(factory);
        self
    }

    pub fn with_mlp(mut self, factory: Arc<dyn QuantumCircuitFactory<B>>) -> Self {
        self.mlp = Some(factory);
        self
    }

    pub fn is_classical(&self) -> bool {
        self.attention.is_none() && self.mlp.is_none()
    }
}

impl<B: Backend> Default for QuantumCircuits<B> {
    fn default() -> Self {
        Self::classical()
    }
}

impl<B: Backend> Clone for QuantumCircuits<B> {
    fn clone(&self) -> Self {
        Self {
            attention: self.attention.clone(),
            mlp: self.mlp.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for QuantumCircuits<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantumCircuits")
            .field("attention", &self.attention.is_some())
            .field("mlp", &self.mlp.is_some())
            .finish()
    }
}

/// Shared handle to an external circuit inside a module tree
///
/// Holds no parameters and records nothing. Moving a model off the autodiff
/// backend swaps the circuit for its [`QuantumCircuit::valid`] counterpart.
pub struct CircuitHandle<B: Backend>(pub Arc<dyn QuantumCircuit<B>>);

impl<B: Backend> Clone for CircuitHandle<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: Backend> fmt::Debug for CircuitHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<B: Backend> std::ops::Deref for CircuitHandle<B> {
    type Target = dyn QuantumCircuit<B>;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl<B: Backend> Module<B> for CircuitHandle<B> {
    type Record = ConstantRecord;

    fn visit<V: ModuleVisitor<B>>(&self, _visitor: &mut V) {}

    fn map<M: ModuleMapper<B>>(self, _mapper: &mut M) -> Self {
        self
    }

    fn load_record(self, _record: Self::Record) -> Self {
        self
    }

    fn into_record(self) -> Self::Record {
        ConstantRecord::new()
    }

    fn to_device(self, _device: &B::Device) -> Self {
        self
    }

    fn fork(self, _device: &B::Device) -> Self {
        self
    }

    fn collect_devices(&self, devices: Devices<B>) -> Devices<B> {
        devices
    }
}

impl<B: AutodiffBackend> AutodiffModule<B> for CircuitHandle<B> {
    type InnerModule = CircuitHandle<B::InnerBackend>;

    fn valid(&self) -> Self::InnerModule {
        CircuitHandle(self.0.valid())
    }
}

impl<B: Backend> ModuleDisplayDefault for CircuitHandle<B> {
    fn content(&self, content: Content) -> Option<Content> {
        content
            .add_single(&format!("QuantumCircuit {{num_qubits: {}}}", self.num_qubits()))
            .optional()
    }
}

impl<B: Backend> ModuleDisplay for CircuitHandle<B> {}

/// A circuit together with its learned weights
#[derive(Module, Debug)]
pub struct QuantumLayer<B: Backend> {
    /// Circuit parameters, shaped by [`QuantumCircuit::weight_shape`]
    pub weights: Param<Tensor<B, 2>>,
    /// Input and output width
    pub num_qubits: usize,
    /// The external circuit
    pub circuit: CircuitHandle<B>,
}

impl<B: Backend> QuantumLayer<B> {
    /// Builds a `width`-qubit circuit and initializes its weights
    ///
    /// Fails with [`ModelError::QuantumWidth`] if the factory hands back a
    /// circuit over a different number of qubits.
    pub fn new(
        site: &'static str,
        width: usize,
        factory: &dyn QuantumCircuitFactory<B>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        let circuit = factory.build(width);
        if circuit.num_qubits() != width {
            return Err(ModelError::QuantumWidth {
                site,
                expected: width,
                actual: circuit.num_qubits(),
            });
        }

        let weights = init.xavier_normal(circuit.weight_shape(), device);

        Ok(Self {
            weights: Param::from_tensor(weights),
            num_qubits: width,
            circuit: CircuitHandle(circuit),
        })
    }

    /// Applies the circuit along the last axis
    ///
    /// `x`: `[batch, seq_len, num_qubits]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>, ModelError> {
        let [batch, seq_len, width] = x.dims();
        if width != self.num_qubits {
            return Err(ModelError::QuantumWidth {
                site: "input",
                expected: self.num_qubits,
                actual: width,
            });
        }

        let rows = batch * seq_len;
        let out = self
            .circuit
            .forward(x.reshape([rows, width]), self.weights.val());

        let [out_rows, out_width] = out.dims();
        if out_width != self.num_qubits {
            return Err(ModelError::QuantumWidth {
                site: "output",
                expected: self.num_qubits,
                actual: out_width,
            });
        }
        if out_rows != rows {
            return Err(ModelError::shape(format!(
                "circuit returned {out_rows} rows for {rows} inputs"
            )));
        }

        Ok(out.reshape([batch, seq_len, width]))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    /// Classical stand-in: `cos(x + sum(weights, axis=0))`
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct CosineCircuit {
        pub num_qubits: usize,
    }

    impl<B: Backend> QuantumCircuit<B> for CosineCircuit {
        fn num_qubits(&self) -> usize {
            self.num_qubits
        }

        fn weight_shape(&self) -> [usize; 2] {
            [2, self.num_qubits]
        }

        fn forward(&self, inputs: Tensor<B, 2>, weights: Tensor<B, 2>) -> Tensor<B, 2> {
            (inputs + weights.sum_dim(0)).cos()
        }

        fn valid(&self) -> Arc<dyn QuantumCircuit<B::InnerBackend>>
        where
            B: AutodiffBackend,
        {
            Arc::new(*self)
        }
    }

    /// Returns only the first row, whatever the batch
    #[derive(Debug, Clone, Copy)]
    struct FirstRowCircuit {
        num_qubits: usize,
    }

    impl<B: Backend> QuantumCircuit<B> for FirstRowCircuit {
        fn num_qubits(&self) -> usize {
            self.num_qubits
        }

        fn weight_shape(&self) -> [usize; 2] {
            [1, self.num_qubits]
        }

        fn forward(&self, inputs: Tensor<B, 2>, _weights: Tensor<B, 2>) -> Tensor<B, 2> {
            inputs.slice([0..1, 0..self.num_qubits])
        }

        fn valid(&self) -> Arc<dyn QuantumCircuit<B::InnerBackend>>
        where
            B: AutodiffBackend,
        {
            Arc::new(*self)
        }
    }

    pub(crate) fn cosine_factory<B: Backend>() -> Arc<dyn QuantumCircuitFactory<B>> {
        Arc::new(|num_qubits: usize| -> Arc<dyn QuantumCircuit<B>> {
            Arc::new(CosineCircuit { num_qubits })
        })
    }

    /// Always builds a circuit of the wrong width
    fn fixed_width_factory<B: Backend>(width: usize) -> Arc<dyn QuantumCircuitFactory<B>> {
        Arc::new(move |_: usize| -> Arc<dyn QuantumCircuit<B>> {
            Arc::new(CosineCircuit { num_qubits: width })
        })
    }

    #[test]
    fn test_quantum_layer_shape() {
        let device = Default::default();
        let factory = cosine_factory::<TestBackend>();
        let layer =
            QuantumLayer::new("test", 8, factory.as_ref(), &mut ParamInit::new(0), &device).unwrap();

        assert_eq!(layer.weights.dims(), [2, 8]);

        let x = Tensor::<TestBackend, 3>::zeros([2, 5, 8], &device);
        let y = layer.forward(x).unwrap();
        assert_eq!(y.dims(), [2, 5, 8]);
    }

    #[test]
    fn test_factory_width_mismatch() {
        let device = Default::default();
        let factory = fixed_width_factory::<TestBackend>(4);
        let err = QuantumLayer::new("attention", 8, factory.as_ref(), &mut ParamInit::new(0), &device)
            .unwrap_err();

        assert_eq!(
            err,
            ModelError::QuantumWidth {
                site: "attention",
                expected: 8,
                actual: 4
            }
        );
    }

    #[test]
    fn test_input_width_mismatch() {
        let device = Default::default();
        let factory = cosine_factory::<TestBackend>();
        let layer =
            QuantumLayer::new("test", 8, factory.as_ref(), &mut ParamInit::new(0), &device).unwrap();

        let x = Tensor::<TestBackend, 3>::zeros([1, 3, 6], &device);
        assert!(matches!(
            layer.forward(x),
            Err(ModelError::QuantumWidth { actual: 6, .. })
        ));
    }

    #[test]
    fn test_circuit_sees_learned_weights() {
        let device = Default::default();
        let factory = cosine_factory::<TestBackend>();
        let layer =
            QuantumLayer::new("test", 4, factory.as_ref(), &mut ParamInit::new(3), &device).unwrap();

        let weights: Vec<f32> = layer.weights.val().into_data().to_vec().unwrap();
        let x = Tensor::<TestBackend, 3>::zeros([1, 1, 4], &device);
        let y: Vec<f32> = layer.forward(x).unwrap().into_data().to_vec().unwrap();

        for q in 0..4 {
            let expected = (weights[q] + weights[4 + q]).cos();
            assert!((y[q] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_circuit_selection_flags() {
        let circuits = QuantumCircuits::<TestBackend>::classical();
        assert!(circuits.is_classical());

        let circuits = circuits.with_mlp(cosine_factory());
        assert!(!circuits.is_classical());
        assert!(circuits.attention.is_none());
    }

    #[test]
    fn test_circuit_row_count_mismatch() {
        let device = Default::default();
        let factory: Arc<dyn QuantumCircuitFactory<TestBackend>> =
            Arc::new(|num_qubits: usize| -> Arc<dyn QuantumCircuit<TestBackend>> {
                Arc::new(FirstRowCircuit { num_qubits })
            });
        let layer =
            QuantumLayer::new("test", 4, factory.as_ref(), &mut ParamInit::new(0), &device).unwrap();

        let x = Tensor::<TestBackend, 3>::zeros([2, 3, 4], &device);
        assert!(matches!(layer.forward(x), Err(ModelError::Shape(_))));
    }

    #[test]
    fn test_gradients_reach_circuit_weights() {
        let device = Default::default();
        let factory = cosine_factory::<TestAutodiffBackend>();
        let layer =
            QuantumLayer::new("test", 4, factory.as_ref(), &mut ParamInit::new(1), &device).unwrap();

        let x: Tensor<TestAutodiffBackend, 3> = ParamInit::new(2).normal([2, 3, 4], 1.0, &device);
        let grads = layer.forward(x).unwrap().sum().backward();

        let grad = layer.weights.grad(&grads).unwrap();
        assert_eq!(grad.dims(), [2, 4]);
        let grad: Vec<f32> = grad.into_data().to_vec().unwrap();
        assert!(grad.iter().any(|g| *g != 0.0));
    }

    #[test]
    fn test_valid_layer_matches_autodiff_layer() {
        let device = Default::default();
        let factory = cosine_factory::<TestAutodiffBackend>();
        let layer =
            QuantumLayer::new("test", 4, factory.as_ref(), &mut ParamInit::new(1), &device).unwrap();
        let inner = layer.valid();

        let x: Tensor<TestAutodiffBackend, 3> = ParamInit::new(2).normal([2, 3, 4], 1.0, &device);
        let expected: Vec<f32> = layer.forward(x.clone()).unwrap().into_data().to_vec().unwrap();
        let actual: Vec<f32> = inner.forward(x.inner()).unwrap().into_data().to_vec().unwrap();

        assert_eq!(inner.num_qubits, 4);
        assert_eq!(expected, actual);
    }
}
