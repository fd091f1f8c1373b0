//! Error type shared by every building block
//!
//! All failures are configuration or precondition violations detected at
//! construction or call time. None of them is retried internally.

use thiserror::Error;

/// Errors raised while building or evaluating a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("hidden size {hidden_size} is not divisible by number of heads {num_heads}")]
    HeadDivisibility { hidden_size: usize, num_heads: usize },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("quantum {site} projection requires width {expected}, got {actual}")]
    QuantumWidth {
        site: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{table} index {index} out of bounds for table of size {size}")]
    IndexOutOfBounds {
        table: &'static str,
        index: i64,
        size: usize,
    },

    #[error("invalid config: {0}")]
    Config(String),
}

impl ModelError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

/// Checks that `num_heads` evenly splits `hidden_size`
pub fn check_head_divisibility(hidden_size: usize, num_heads: usize) -> Result<(), ModelError> {
    if num_heads == 0 || hidden_size % num_heads != 0 {
        return Err(ModelError::HeadDivisibility {
            hidden_size,
            num_heads,
        });
    }
    Ok(())
}

/// Checks that a dropout rate lies in `[0, 1)`
pub fn check_dropout_rate(rate: f64) -> Result<(), ModelError> {
    if !(0.0..1.0).contains(&rate) {
        return Err(ModelError::Config(format!(
            "dropout rate must be in [0, 1), got {rate}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_divisibility() {
        assert!(check_head_divisibility(8, 2).is_ok());
        assert_eq!(
            check_head_divisibility(10, 4),
            Err(ModelError::HeadDivisibility {
                hidden_size: 10,
                num_heads: 4
            })
        );
        assert!(check_head_divisibility(8, 0).is_err());
    }

    #[test]
    fn test_dropout_rate_bounds() {
        assert!(check_dropout_rate(0.0).is_ok());
        assert!(check_dropout_rate(0.5).is_ok());
        assert!(check_dropout_rate(1.0).is_err());
        assert!(check_dropout_rate(-0.1).is_err());
    }

    #[test]
    fn test_error_messages_name_the_invariant() {
        let err = ModelError::QuantumWidth {
            site: "attention",
            expected: 8,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "quantum attention projection requires width 8, got 4"
        );
    }
}
