//! Error types for sdexec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not implemented")]
    NotImplemented,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to exchange build token: {body}")]
    ExchangeFailure { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A configuration rejected by the schema of an operation.
///
/// The message names the first violated field or rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ValidationError: {message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures of the HTTP transport, passed through to the caller untouched.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, Error>;
