//! Selector and call-outcome error definitions.

use std::io;
use thiserror::Error;

/// Errors surfaced synchronously by node selection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The candidate set was empty when a node was requested.
    #[error("no_available_node")]
    NoAvailableNode,

    /// The process-wide selector builder was already configured.
    #[error("global selector already set")]
    GlobalAlreadySet,

    /// A balancer name that maps to no known algorithm.
    #[error("unknown balancer: {0}")]
    UnknownBalancer(String),
}

/// Result type for selection operations.
pub type SelectorResult<T> = Result<T, SelectorError>;

/// Outcome error of a finished RPC, reported back through `DoneInfo`.
///
/// The selector never returns these; they are input data that decide
/// whether a completed call counts against a node's success rate.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("canceled")]
    Canceled,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Status-coded failure (HTTP-style codes).
    #[error("status {code}: {message}")]
    Status { code: u16, message: String },

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    /// Default classification: does this outcome indicate the node itself
    /// is slow or unreachable?
    ///
    /// Anything not recognised here is treated as a success for weighting.
    pub fn is_node_failure(&self) -> bool {
        match self {
            CallError::DeadlineExceeded
            | CallError::Canceled
            | CallError::ServiceUnavailable(_)
            | CallError::GatewayTimeout(_) => true,
            CallError::Status { code, .. } => matches!(code, 503 | 504),
            CallError::Other(_) => false,
        }
    }
}

impl From<io::Error> for CallError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => CallError::DeadlineExceeded,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => CallError::ServiceUnavailable(err.to_string()),
            _ => CallError::Other(Box::new(err)),
        }
    }
}
