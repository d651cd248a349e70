//! Error types for DQ Core
//!
//! Provides error handling for:
//! - Backend calls (transport failures and `success: false` answers alike)
//! - Configuration loading
//! - Query hook operations, aggregating the lower layers

use dq_domain::DomainError;
use dq_query::{MutationError, QueryError};
use std::path::PathBuf;

/// Errors raised by a [`crate::TaskService`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Connection or I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP status
    #[error("http {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Server message or reason phrase
        message: String,
    },

    /// Backend answered `success: false`
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// `success: true` without a `data` field
    #[error("response carried no data")]
    MissingData,
}

impl ServiceError {
    /// Check if a retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected(_) | Self::Decode(_) | Self::MissingData => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Http {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Main error type of the query hooks
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Backend call failed
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Cache read or fetch failed
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Mutation lifecycle or local write failed
    #[error("mutation error: {0}")]
    Mutation(MutationError),

    /// Malformed domain value
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Target status is in no known vocabulary; nothing was written or sent
    #[error("unrecognized status: '{0}'")]
    UnrecognizedStatus(String),
}

impl ClientError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(error) => error.is_retryable(),
            Self::Query(QueryError::Fetch { .. } | QueryError::Superseded(_)) => true,
            _ => false,
        }
    }

    /// Whether an optimistic write was rolled back
    #[inline]
    #[must_use]
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::Service(_) | Self::Mutation(MutationError::Request(_)))
    }
}

impl From<MutationError> for ClientError {
    /// Unwraps request failures back into the service error that caused them
    fn from(error: MutationError) -> Self {
        match error {
            MutationError::Request(source) => match source.downcast::<ServiceError>() {
                Ok(service) => Self::Service(*service),
                Err(other) => Self::Mutation(MutationError::Request(other)),
            },
            MutationError::Query(query) => Self::Query(query),
            other => Self::Mutation(other),
        }
    }
}

/// Result type alias for hook operations
pub type ClientResult<T> = Result<T, ClientError>;
