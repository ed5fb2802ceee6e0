use std::path::PathBuf;
use thiserror::Error;

/// Domain errors raised by the pipeline stages.
///
/// Stages return `anyhow::Result` and wrap these with context, so callers
/// that need to branch on the failure kind can `downcast_ref::<PipelineError>()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("configuration file not found: {path:?}")]
    MissingConfig { path: PathBuf },

    #[error("bad configuration value: {parameter} = {value}")]
    InvalidConfig { parameter: String, value: String },

    #[error("{table} is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("invalid value '{value}' in column '{column}' at line {line}")]
    InvalidValue {
        column: String,
        value: String,
        line: u64,
    },

    #[error("not enough data: {message}")]
    InsufficientData { message: String },

    #[error("model not fitted yet - call fit() first")]
    ModelNotFitted,

    #[error("model expects {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },
}

impl PipelineError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn invalid_config(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidConfig {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }
}
