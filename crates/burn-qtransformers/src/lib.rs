//! Transformer Classifiers with Quantum-Swappable Sublayers
//!
//! Two classifiers share one block stack from `burn-qtransformers-core`:
//!
//! - [`text::SequenceClassifier`] - token sequences, mean-pooled
//! - [`vision::ImageClassifier`] - square images cut into patches, pooled
//!   by class token or by mean
//!
//! Whether attention or feed-forward projections run as quantum circuits is
//! decided by the [`QuantumCircuits`] passed at construction.
//!
//! # Example
//!
//! ```ignore
//! use burn_qtransformers::{ImageClassifierConfig, QuantumCircuits, ForwardMode, RandomStream};
//!
//! let model = ImageClassifierConfig::mnist()
//!     .init(&QuantumCircuits::classical(), seed, &device)?;
//!
//! // Evaluation
//! let logits = model.infer(images.clone())?;
//!
//! // Training-mode pass with an explicit dropout stream
//! let mut stream = RandomStream::new(step);
//! let logits = model.forward(images, &mut ForwardMode::training(&mut stream))?;
//! ```

pub mod config;
pub mod text;
pub mod vision;

pub use config::{ConfigError, ModelConfig, TransformerConfig};
pub use text::{SequenceClassifier, SequenceClassifierConfig};
pub use vision::{ClassifierPooling, ImageClassifier, ImageClassifierConfig};

pub use burn_qtransformers_core::dropout::{ForwardMode, RandomStream};
pub use burn_qtransformers_core::quantum::{QuantumCircuit, QuantumCircuitFactory, QuantumCircuits};
pub use burn_qtransformers_core::ModelError;
