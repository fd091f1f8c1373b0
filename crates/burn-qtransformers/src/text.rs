//! Sequence classifier for token inputs
//!
//! # Architecture
//!
//! ```text
//! tokens -> token embedding + positional embedding -> dropout
//!        -> N x TransformerBlock -> LayerNorm -> mean over positions -> Linear
//! ```
//!
//! Token ids come from an external tokenizer and are padded to equal length
//! per batch by the caller.

use burn::module::Param;
use burn::nn::{Embedding, Linear};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use burn_qtransformers_core::dropout::{Dropout, ForwardMode};
use burn_qtransformers_core::init::ParamInit;
use burn_qtransformers_core::layernorm::LayerNorm;
use burn_qtransformers_core::projection::dense;
use burn_qtransformers_core::quantum::QuantumCircuits;
use burn_qtransformers_core::transformer::{forward_blocks, TransformerBlock};
use burn_qtransformers_core::ModelError;

use crate::config::TransformerConfig;

/// Sequence Classifier Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceClassifierConfig {
    /// Block settings
    #[serde(flatten)]
    pub transformer: TransformerConfig,
    /// Vocabulary size
    pub num_tokens: usize,
    /// Maximum sequence length (positional table size)
    pub max_sequence_length: usize,
    /// Number of output classes
    pub num_classes: usize,
}

impl SequenceClassifierConfig {
    pub fn new(
        transformer: TransformerConfig,
        num_tokens: usize,
        max_sequence_length: usize,
        num_classes: usize,
    ) -> Self {
        Self {
            transformer,
            num_tokens,
            max_sequence_length,
            num_classes,
        }
    }

    /// Binary sentiment classification (IMDB reviews)
    ///
    /// The vocabulary and sequence length depend on the external tokenizer.
    pub fn imdb(num_tokens: usize, max_sequence_length: usize) -> Self {
        Self {
            transformer: TransformerConfig::new(8, 2, 4, 8).with_dropout(0.1),
            num_tokens,
            max_sequence_length,
            num_classes: 2,
        }
    }

    /// Creates a tiny model for testing
    pub fn tiny() -> Self {
        Self {
            transformer: TransformerConfig::new(8, 2, 2, 16),
            num_tokens: 50,
            max_sequence_length: 16,
            num_classes: 3,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.transformer.validate()?;
        if self.num_tokens == 0 {
            return Err(ModelError::Config("num_tokens must be positive".into()));
        }
        if self.max_sequence_length == 0 {
            return Err(ModelError::Config(
                "max_sequence_length must be positive".into(),
            ));
        }
        if self.num_classes == 0 {
            return Err(ModelError::Config("num_classes must be positive".into()));
        }
        Ok(())
    }

    /// Initialize the model from `seed`
    ///
    /// The same `(config, circuits, seed)` always yields identical parameters.
    pub fn init<B: Backend>(
        &self,
        circuits: &QuantumCircuits<B>,
        seed: u64,
        device: &B::Device,
    ) -> Result<SequenceClassifier<B>, ModelError> {
        self.validate()?;
        let hidden = self.transformer.hidden_size;
        let mut init = ParamInit::new(seed);

        let token_embedding = embedding(self.num_tokens, hidden, &mut init, device);
        let position_embedding = embedding(self.max_sequence_length, hidden, &mut init, device);
        let blocks = self.transformer.block().init_stack(
            self.transformer.num_transformer_blocks,
            circuits,
            &mut init,
            device,
        )?;
        let norm = LayerNorm::new(hidden, device);
        let head = dense(hidden, self.num_classes, &mut init, device);

        let model = SequenceClassifier {
            token_embedding,
            position_embedding,
            dropout: Dropout::new(self.transformer.dropout_rate),
            blocks,
            norm,
            head,
        };

        tracing::debug!(
            num_params = model.num_params(),
            num_blocks = self.transformer.num_transformer_blocks,
            quantum_attention = circuits.attention.is_some(),
            quantum_mlp = circuits.mlp.is_some(),
            "initialized sequence classifier"
        );

        Ok(model)
    }
}

/// Embedding table with N(0, 1/hidden) entries
fn embedding<B: Backend>(
    num_embeddings: usize,
    hidden: usize,
    init: &mut ParamInit,
    device: &B::Device,
) -> Embedding<B> {
    let std = (1.0 / hidden as f64).sqrt();
    Embedding {
        weight: Param::from_tensor(init.normal([num_embeddings, hidden], std, device)),
    }
}

/// Transformer classifier over token sequences
#[derive(Module, Debug)]
pub struct SequenceClassifier<B: Backend> {
    pub token_embedding: Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub dropout: Dropout,
    pub blocks: Vec<TransformerBlock<B>>,
    pub norm: LayerNorm<B>,
    pub head: Linear<B>,
}

impl<B: Backend> SequenceClassifier<B> {
    pub fn num_tokens(&self) -> usize {
        self.token_embedding.weight.dims()[0]
    }

    pub fn max_sequence_length(&self) -> usize {
        self.position_embedding.weight.dims()[0]
    }

    pub fn hidden_size(&self) -> usize {
        self.token_embedding.weight.dims()[1]
    }

    /// Rejects sequences longer than the positional table and ids outside the vocabulary
    fn check_tokens(&self, tokens: &Tensor<B, 2, Int>) -> Result<(), ModelError> {
        let [batch, seq_len] = tokens.dims();
        if batch == 0 {
            return Err(ModelError::Shape("empty batch".into()));
        }
        if seq_len == 0 {
            return Err(ModelError::Shape("empty token sequence".into()));
        }
        if seq_len > self.max_sequence_length() {
            return Err(ModelError::IndexOutOfBounds {
                table: "position",
                index: seq_len as i64 - 1,
                size: self.max_sequence_length(),
            });
        }

        let max = tokens.clone().max().into_scalar().elem::<i64>();
        if max >= self.num_tokens() as i64 {
            return Err(ModelError::IndexOutOfBounds {
                table: "token",
                index: max,
                size: self.num_tokens(),
            });
        }
        let min = tokens.clone().min().into_scalar().elem::<i64>();
        if min < 0 {
            return Err(ModelError::IndexOutOfBounds {
                table: "token",
                index: min,
                size: self.num_tokens(),
            });
        }
        Ok(())
    }

    /// Activations after the final layer norm
    ///
    /// # Arguments
    ///
    /// * `tokens` - Token ids [batch, seq_len]
    /// * `mode` - Deterministic, or training with a dropout stream
    ///
    /// # Returns
    ///
    /// [batch, seq_len, hidden_size]
    pub fn forward_features(
        &self,
        tokens: Tensor<B, 2, Int>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 3>, ModelError> {
        self.check_tokens(&tokens)?;
        let [batch, seq_len] = tokens.dims();
        let hidden = self.hidden_size();

        let x = self.token_embedding.forward(tokens);
        let positions = self
            .position_embedding
            .weight
            .val()
            .slice([0..seq_len, 0..hidden])
            .unsqueeze::<3>();
        let x = self.dropout.forward(x + positions, mode);

        tracing::trace!(batch, seq_len, "sequence classifier forward");

        let x = forward_blocks(&self.blocks, x, mode)?;
        Ok(self.norm.forward(x))
    }

    /// Global average pooling over positions
    ///
    /// [batch, seq_len, hidden_size] -> [batch, hidden_size]
    pub fn pool(&self, features: Tensor<B, 3>) -> Tensor<B, 2> {
        features.mean_dim(1).squeeze(1)
    }

    /// Classification logits [batch, num_classes]
    pub fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 2>, ModelError> {
        let features = self.forward_features(tokens, mode)?;
        Ok(self.head.forward(self.pool(features)))
    }

    /// Evaluation-mode logits
    pub fn infer(&self, tokens: Tensor<B, 2, Int>) -> Result<Tensor<B, 2>, ModelError> {
        self.forward(tokens, &mut ForwardMode::Deterministic)
    }
}
