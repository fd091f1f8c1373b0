//! Pre-norm transformer block and block stack
//!
//! Shared by the text and vision classifiers. Each block owns its own
//! parameters; the stack applies them in order.

use burn::prelude::*;

use crate::attention::{MultiHeadSelfAttention, MultiHeadSelfAttentionConfig};
use crate::dropout::{Dropout, ForwardMode};
use crate::error::{check_dropout_rate, check_head_divisibility, ModelError};
use crate::feed_forward::{FeedForward, FeedForwardConfig};
use crate::init::ParamInit;
use crate::layernorm::LayerNorm;
use crate::quantum::QuantumCircuits;

/// Pre-norm Transformer Block
///
/// Architecture:
/// ```text
/// x = x + dropout(attention(norm1(x)))
/// x = x + dropout(ffn(norm2(x)))
/// ```
#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    /// Layer norm before attention
    pub attention_norm: LayerNorm<B>,
    /// Multi-head self-attention
    pub attention: MultiHeadSelfAttention<B>,
    /// Dropout on the attention branch
    pub attention_dropout: Dropout,
    /// Layer norm before the feed-forward network
    pub mlp_norm: LayerNorm<B>,
    /// Feed-forward network
    pub feed_forward: FeedForward<B>,
    /// Dropout on the feed-forward branch
    pub mlp_dropout: Dropout,
}

/// Configuration for TransformerBlock
#[derive(Debug, Clone)]
pub struct TransformerBlockConfig {
    /// Hidden dimension
    pub hidden_size: usize,
    /// Number of attention heads
    pub num_heads: usize,
    /// Intermediate FFN dimension
    pub mlp_hidden_size: usize,
    /// Dropout rate, applied to attention weights, both residual branches
    /// and the feed-forward expansion
    pub dropout_rate: f64,
}

impl TransformerBlockConfig {
    pub fn new(hidden_size: usize, num_heads: usize, mlp_hidden_size: usize) -> Self {
        Self {
            hidden_size,
            num_heads,
            mlp_hidden_size,
            dropout_rate: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_head_divisibility(self.hidden_size, self.num_heads)?;
        check_dropout_rate(self.dropout_rate)?;
        if self.mlp_hidden_size == 0 {
            return Err(ModelError::Config("mlp_hidden_size must be positive".into()));
        }
        Ok(())
    }

    /// Initialize the transformer block
    pub fn init<B: Backend>(
        &self,
        circuits: &QuantumCircuits<B>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<TransformerBlock<B>, ModelError> {
        self.validate()?;

        let attention_norm = LayerNorm::new(self.hidden_size, device);
        let attention = MultiHeadSelfAttentionConfig::new(self.hidden_size, self.num_heads)
            .with_dropout(self.dropout_rate)
            .init(circuits.attention.as_deref(), init, device)?;
        let mlp_norm = LayerNorm::new(self.hidden_size, device);
        let feed_forward = FeedForwardConfig::new(self.hidden_size, self.mlp_hidden_size)
            .with_dropout(self.dropout_rate)
            .init(circuits.mlp.as_deref(), init, device)?;

        Ok(TransformerBlock {
            attention_norm,
            attention,
            attention_dropout: Dropout::new(self.dropout_rate),
            mlp_norm,
            feed_forward,
            mlp_dropout: Dropout::new(self.dropout_rate),
        })
    }

    /// Initialize `num_blocks` blocks with independent parameters
    pub fn init_stack<B: Backend>(
        &self,
        num_blocks: usize,
        circuits: &QuantumCircuits<B>,
        init: &mut ParamInit,
        device: &B::Device,
    ) -> Result<Vec<TransformerBlock<B>>, ModelError> {
        (0..num_blocks)
            .map(|_| self.init(circuits, init, device))
            .collect()
    }
}

impl<B: Backend> TransformerBlock<B> {
    /// Forward pass through the transformer block
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [batch, seq_len, hidden_size]
    /// * `mode` - Deterministic, or training with a dropout stream
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 3>, ModelError> {
        // Pre-norm attention with residual
        let h = self.attention.forward(self.attention_norm.forward(x.clone()), mode)?;
        let x = x + self.attention_dropout.forward(h, mode);

        // Pre-norm FFN with residual
        let h = self.feed_forward.forward(self.mlp_norm.forward(x.clone()), mode)?;
        Ok(x + self.mlp_dropout.forward(h, mode))
    }
}

/// Applies each block in order
pub fn forward_blocks<B: Backend>(
    blocks: &[TransformerBlock<B>],
    x: Tensor<B, 3>,
    mode: &mut ForwardMode<'_>,
) -> Result<Tensor<B, 3>, ModelError> {
    blocks
        .iter()
        .try_fold(x, |x, block| block.forward(x, mode))
}
