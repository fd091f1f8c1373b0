//! Core Building Blocks for Quantum-Swappable Transformers
//!
//! This crate provides the sublayers shared by the text and vision
//! classifiers in `burn-qtransformers`. Every linear projection that may be
//! replaced by a parameterized quantum circuit goes through
//! [`projection::Projection`], so the surrounding architecture is the same
//! whether a sublayer is classical or quantum.
//!
//! # Modules
//!
//! ## Projections
//!
//! - [`projection`] - Classical affine map or quantum circuit, fixed at construction
//! - [`quantum`] - Circuit capability traits and the weight-owning quantum layer
//!
//! ## Sublayers
//!
//! - [`attention`] - Multi-head scaled dot-product self-attention
//! - [`feed_forward`] - Expand/contract feed-forward network with GELU
//! - [`transformer`] - Pre-norm residual transformer block
//! - [`layernorm`] - Layer normalization
//! - [`patch`] - Non-overlapping patch embedding for images
//!
//! ## Determinism
//!
//! - [`init`] - Seeded parameter initialization
//! - [`dropout`] - Dropout over an explicit, caller-seeded random stream
//!
//! # Example
//!
//! ```ignore
//! use burn_qtransformers_core::dropout::ForwardMode;
//! use burn_qtransformers_core::init::ParamInit;
//! use burn_qtransformers_core::quantum::QuantumCircuits;
//! use burn_qtransformers_core::transformer::TransformerBlockConfig;
//!
//! let mut init = ParamInit::new(seed);
//! let block = TransformerBlockConfig::new(8, 2, 8)
//!     .init(&QuantumCircuits::classical(), &mut init, &device)?;
//!
//! let y = block.forward(x, &mut ForwardMode::Deterministic)?;
//! ```

pub mod attention;
pub mod dropout;
pub mod error;
pub mod feed_forward;
pub mod init;
pub mod layernorm;
pub mod patch;
pub mod projection;
pub mod quantum;
pub mod transformer;

pub use error::ModelError;
