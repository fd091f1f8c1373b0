//! Model configuration records
//!
//! Configurations are plain serde records. [`ModelConfig`] tags them by
//! modality so a single JSON file can describe either classifier:
//!
//! ```json
//! {
//!   "modality": "vision",
//!   "hidden_size": 8,
//!   "num_heads": 2,
//!   "num_transformer_blocks": 4,
//!   "mlp_hidden_size": 8,
//!   "dropout_rate": 0.1,
//!   "num_classes": 10,
//!   "patch_size": 7,
//!   "image_size": 28,
//!   "num_channels": 1,
//!   "classifier": "gap"
//! }
//! ```

use std::path::Path;

use burn_qtransformers_core::error::{check_dropout_rate, check_head_divisibility};
use burn_qtransformers_core::transformer::TransformerBlockConfig;
use burn_qtransformers_core::ModelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::SequenceClassifierConfig;
use crate::vision::ImageClassifierConfig;

/// Errors raised while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] ModelError),
}

/// Settings shared by every transformer block in a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Width of every activation inside the blocks
    pub hidden_size: usize,
    /// Number of attention heads (must divide `hidden_size`)
    pub num_heads: usize,
    /// Number of stacked blocks
    pub num_transformer_blocks: usize,
    /// Feed-forward expansion width
    pub mlp_hidden_size: usize,
    /// Dropout rate in `[0, 1)`
    #[serde(default)]
    pub dropout_rate: f64,
}

impl TransformerConfig {
    pub fn new(
        hidden_size: usize,
        num_heads: usize,
        num_transformer_blocks: usize,
        mlp_hidden_size: usize,
    ) -> Self {
        Self {
            hidden_size,
            num_heads,
            num_transformer_blocks,
            mlp_hidden_size,
            dropout_rate: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    /// Per-block configuration
    pub fn block(&self) -> TransformerBlockConfig {
        TransformerBlockConfig::new(self.hidden_size, self.num_heads, self.mlp_hidden_size)
            .with_dropout(self.dropout_rate)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.hidden_size == 0 {
            return Err(ModelError::Config("hidden_size must be positive".into()));
        }
        check_head_divisibility(self.hidden_size, self.num_heads)?;
        check_dropout_rate(self.dropout_rate)?;
        if self.mlp_hidden_size == 0 {
            return Err(ModelError::Config("mlp_hidden_size must be positive".into()));
        }
        Ok(())
    }
}

/// Either classifier's configuration, tagged by modality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum ModelConfig {
    /// Token-sequence classifier
    Text(SequenceClassifierConfig),
    /// Patch-based image classifier
    Vision(ImageClassifierConfig),
}

impl ModelConfig {
    /// Reads and validates a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Self::Text(config) => config.validate(),
            Self::Vision(config) => config.validate(),
        }
    }

    pub fn transformer(&self) -> &TransformerConfig {
        match self {
            Self::Text(config) => &config.transformer,
            Self::Vision(config) => &config.transformer,
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Self::Text(config) => config.num_classes,
            Self::Vision(config) => config.num_classes,
        }
    }
}
