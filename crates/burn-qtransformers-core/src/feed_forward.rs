//! Expand/contract feed-forward sublayer
//!
//! ```text
//! output = contract(gelu(dropout(expand(x))))
//! ```
//!
//! `expand` is a [`Projection`] and may be a quantum circuit, in which case
//! `mlp_hidden_size` must equal `hidden_size`. `contract` is always a dense
//! layer.

use burn::nn::Linear;
use burn::prelude::*;

use crate::dropout::{Dropout, ForwardMode};
use crate::error::ModelError;
use crate::init::ParamInit;
use crate::projection::{dense, Projection};
use crate::quantum::QuantumCircuitFactory;

/// Two-stage feed-forward network with GELU
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    /// hidden -> mlp_hidden
    pub expand: Projection<B>,
    /// mlp_hidden -> hidden
    pub contract: Linear<B>,
    /// Dropout after the expansion
    pub dropout: Dropout,
}

/// Configuration for FeedForward
#[derive(Debug, Clone)]
pub struct FeedForwardConfig {
    /// Input/output dimension
    pub hidden_size: usize,
    /// Intermediate (expanded) dimension
    pub mlp_hidden_size: usize,
    /// Dropout rate after the expansion
    pub dropout_rate: f64,
}

impl FeedForwardConfig {
    pub fn new(hidden_size: usize, mlp_hidden_size: usize) -> Self {
        Self {
            hidden_size,
            mlp_hidden_size,
            dropout_rate: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn init<B: Backend>(
        &self,
        circuit: Option<&dyn QuantumCircuitFactory<B>>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<FeedForward<B>, ModelError> {
        let expand = Projection::select(
            "feed_forward",
            self.hidden_size,
            self.mlp_hidden_size,
            circuit,
            init,
            device,
        )?;
        let contract = dense(self.mlp_hidden_size, self.hidden_size, init, device);

        Ok(FeedForward {
            expand,
            contract,
            dropout: Dropout::new(self.dropout_rate),
        })
    }
}

impl<B: Backend> FeedForward<B> {
    /// `x`: `[batch, seq_len, hidden_size]`, output has the same shape
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 3>, ModelError> {
        let h = self.expand.forward(x)?;
        let h = self.dropout.forward(h, mode);
        let h = burn::tensor::activation::gelu(h);
        Ok(self.contract.forward(h))
    }
}
