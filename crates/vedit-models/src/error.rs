//! Model-level errors.

use thiserror::Error;

use crate::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid option `{field}`: {message}")]
    InvalidOption { field: &'static str, message: String },

    #[error("Invalid scene [{start}, {end}): end must be greater than start and start must be >= 0")]
    InvalidScene { start: f64, end: f64 },

    #[error("Illegal job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Progress must increase ({current} -> {requested})")]
    ProgressRegression { current: u8, requested: u8 },
}

impl ModelError {
    pub fn invalid_option(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            field,
            message: message.into(),
        }
    }
}
