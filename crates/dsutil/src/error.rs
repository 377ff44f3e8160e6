use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ValueType;

/// Error returned by a reader callback that is not a request to stop.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DsutilError {
    #[error("{}: no such file", path.display())]
    NotFound { path: PathBuf },
    #[error("cannot create {}: {source}", path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{value_type}: {message}")]
    ValueDomain {
        value_type: ValueType,
        message: String,
    },
    #[error("{value_type}: value out of range: {message}")]
    Range {
        value_type: ValueType,
        message: String,
    },
    #[error("{value_type}: None not supported (open with none_support)")]
    NullNotSupported { value_type: ValueType },
    #[error("{value_type}: cannot parse {input:?}")]
    Parse { value_type: ValueType, input: String },
    #[error("reader callback failed: {0}")]
    Callback(#[source] BoxError),
    #[error("corrupt column file: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl DsutilError {
    /// Whether this error rejects a single value (and is therefore eligible for default
    /// substitution) rather than the session.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            Self::ValueDomain { .. }
                | Self::Range { .. }
                | Self::NullNotSupported { .. }
                | Self::Parse { .. }
        )
    }

    pub(crate) fn domain(value_type: ValueType, message: impl Into<String>) -> Self {
        Self::ValueDomain {
            value_type,
            message: message.into(),
        }
    }

    pub(crate) fn range(value_type: ValueType, message: impl Into<String>) -> Self {
        Self::Range {
            value_type,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DsutilError>;
