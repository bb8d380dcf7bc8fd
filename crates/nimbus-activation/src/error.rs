//! Error types for activation selection and retrieval.

use std::error::Error;

use thiserror::Error;

/// Primary error type for activation selection and batch retrieval.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// Neither an activation id nor "most recent" selection was requested.
    #[error("an activation id is required (or pass --last to select the most recent)")]
    MissingIdentifier,
    /// A listing query used for resolution matched nothing.
    #[error("no activations were returned")]
    NoActivationsFound {
        /// Name filter applied to the listing, when one was supplied.
        name_filter: Option<String>,
    },
    /// The remote platform rejected or failed a request.
    #[error("failed to {operation}")]
    Upstream {
        /// Human-readable description of the attempted operation.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Every member of a non-empty batch failed.
    #[error("all {attempted} activation fetches failed")]
    AllFetchesFailed {
        /// Number of activations that were attempted.
        attempted: usize,
        /// Failure reported by the first batch member.
        #[source]
        source: FetchError,
    },
}

impl ActivationError {
    /// Wrap a gateway failure with the operation that triggered it.
    pub fn upstream(operation: &'static str, error: impl Into<anyhow::Error>) -> Self {
        let error: anyhow::Error = error.into();
        Self::Upstream {
            operation,
            source: error.into(),
        }
    }
}

/// Failure of a single member of a batch fetch.
#[derive(Debug, Error)]
#[error("failed to retrieve activation {activation_id}")]
pub struct FetchError {
    /// Identifier of the activation that could not be fetched.
    pub activation_id: String,
    /// Underlying transport or platform failure.
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

impl FetchError {
    pub(crate) fn new(activation_id: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            activation_id: activation_id.into(),
            source: error.into(),
        }
    }

    /// Underlying failure with every nested cause, joined by `: `.
    #[must_use]
    pub fn reason(&self) -> String {
        let mut reason = self.source.to_string();
        let mut cause = self.source.source();
        while let Some(inner) = cause {
            reason.push_str(": ");
            reason.push_str(&inner.to_string());
            cause = inner.source();
        }
        reason
    }
}

/// Convenience alias for activation operation results.
pub type ActivationResult<T> = Result<T, ActivationError>;
