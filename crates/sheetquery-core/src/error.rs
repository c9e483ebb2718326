//! Error types for sheetquery core.

use thiserror::Error;

use sheetquery_engine::engine::{EvalAltResult, is_timeout};

/// Errors a request can end with. None of them are retried.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("File not found: {file}")]
    NotFound { file: String },

    #[error("Sheet '{sheet}' not found in {file}")]
    InvalidSheet { file: String, sheet: String },

    #[error("Failed to read {file}: {message}")]
    Parse { file: String, message: String },

    #[error("{0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    pub fn not_found(file: impl Into<String>) -> Self {
        QueryError::NotFound { file: file.into() }
    }

    pub fn parse(file: impl Into<String>, message: impl ToString) -> Self {
        QueryError::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// True for the errors a caller sees as "no such file or sheet".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueryError::NotFound { .. } | QueryError::InvalidSheet { .. }
        )
    }
}

impl From<Box<EvalAltResult>> for QueryError {
    fn from(err: Box<EvalAltResult>) -> Self {
        if is_timeout(&err) {
            QueryError::Evaluation("Query exceeded its time limit".to_string())
        } else {
            QueryError::Evaluation(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
