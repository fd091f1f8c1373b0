//! Multi-head scaled dot-product self-attention
//!
//! The query, key, value and output projections are [`Projection`]s, so the
//! whole sublayer switches to quantum circuits when an attention factory is
//! supplied at construction. Quantum projections keep width `hidden_size`.

use burn::prelude::*;

use crate::dropout::{Dropout, ForwardMode};
use crate::error::{check_head_divisibility, ModelError};
use crate::init::ParamInit;
use crate::projection::Projection;
use crate::quantum::QuantumCircuitFactory;

/// Multi-head self-attention with pluggable projections
#[derive(Module, Debug)]
pub struct MultiHeadSelfAttention<B: Backend> {
    /// Query projection
    pub query: Projection<B>,
    /// Key projection
    pub key: Projection<B>,
    /// Value projection
    pub value: Projection<B>,
    /// Output projection
    pub output: Projection<B>,
    /// Dropout on the attention weights
    pub dropout: Dropout,
    /// Number of heads
    pub num_heads: usize,
    /// Dimension per head
    pub head_dim: usize,
}

/// Configuration for MultiHeadSelfAttention
#[derive(Debug, Clone)]
pub struct MultiHeadSelfAttentionConfig {
    /// Hidden dimension
    pub hidden_size: usize,
    /// Number of heads (must divide `hidden_size`)
    pub num_heads: usize,
    /// Dropout rate on the attention weights
    pub dropout_rate: f64,
}

impl MultiHeadSelfAttentionConfig {
    pub fn new(hidden_size: usize, num_heads: usize) -> Self {
        Self {
            hidden_size,
            num_heads,
            dropout_rate: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    /// Initialize the attention module
    ///
    /// Fails with [`ModelError::HeadDivisibility`] before creating any
    /// parameter if `num_heads` does not divide `hidden_size`.
    pub fn init<B: Backend>(
        &self,
        circuit: Option<&dyn QuantumCircuitFactory<B>>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<MultiHeadSelfAttention<B>, ModelError> {
        check_head_divisibility(self.hidden_size, self.num_heads)?;
        let hidden = self.hidden_size;

        let query = Projection::select("attention", hidden, hidden, circuit, init, device)?;
        let key = Projection::select("attention", hidden, hidden, circuit, init, device)?;
        let value = Projection::select("attention", hidden, hidden, circuit, init, device)?;
        let output = Projection::select("attention", hidden, hidden, circuit, init, device)?;

        Ok(MultiHeadSelfAttention {
            query,
            key,
            value,
            output,
            dropout: Dropout::new(self.dropout_rate),
            num_heads: self.num_heads,
            head_dim: hidden / self.num_heads,
        })
    }
}

impl<B: Backend> MultiHeadSelfAttention<B> {
    pub fn hidden_size(&self) -> usize {
        self.num_heads * self.head_dim
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [batch, seq_len, hidden_size]
    /// * `mode` - Deterministic, or training with a dropout stream
    ///
    /// # Returns
    ///
    /// Tensor of the same shape as `x`
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 3>, ModelError> {
        let [batch, seq_len, hidden] = x.dims();
        if hidden != self.hidden_size() {
            return Err(ModelError::shape(format!(
                "attention expects hidden size {}, got {hidden}",
                self.hidden_size()
            )));
        }

        let q = self.query.forward(x.clone())?;
        let k = self.key.forward(x.clone())?;
        let v = self.value.forward(x)?;

        // [batch, seq_len, hidden] -> [batch, num_heads, seq_len, head_dim]
        let split_heads = |t: Tensor<B, 3>| {
            t.reshape([batch, seq_len, self.num_heads, self.head_dim])
                .swap_dims(1, 2)
        };
        let q = split_heads(q);
        let k = split_heads(k);
        let v = split_heads(v);

        // [batch, heads, seq_q, seq_k]
        let scale = (self.head_dim as f64).powf(-0.5);
        let logits = q.matmul(k.transpose()) * scale;
        let weights = burn::tensor::activation::softmax(logits, 3);
        let weights = self.dropout.forward(weights, mode);

        let out = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq_len, hidden]);

        self.output.forward(out)
    }
}
