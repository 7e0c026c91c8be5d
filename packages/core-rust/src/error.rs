//! Error taxonomy shared by the builders and the executor.

/// Errors produced while building or executing a paginated query.
///
/// `Validation` and `InvalidCursor` are client errors: the request must be
/// fixed and is never retried. `SourceUnavailable` carries the data store's
/// own failure unchanged; retry policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid parameter `{field}`: {reason}")]
    Validation { field: String, reason: String },
    #[error("invalid cursor: {reason}")]
    InvalidCursor { reason: String },
    #[error("data source unavailable: {source}")]
    SourceUnavailable {
        #[source]
        source: anyhow::Error,
    },
    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Builds a [`QueryError::Validation`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`QueryError::InvalidCursor`].
    pub fn invalid_cursor(reason: impl Into<String>) -> Self {
        Self::InvalidCursor {
            reason: reason.into(),
        }
    }

    /// Wraps a data source failure.
    pub fn source_unavailable(source: impl Into<anyhow::Error>) -> Self {
        Self::SourceUnavailable {
            source: source.into(),
        }
    }

    /// Stable snake_case name of the error kind, suitable for response bodies and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation { .. } => "validation",
            QueryError::InvalidCursor { .. } => "invalid_cursor",
            QueryError::SourceUnavailable { .. } => "source_unavailable",
            QueryError::Cancelled => "cancelled",
        }
    }

    /// Whether the request itself was at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueryError::Validation { .. } | QueryError::InvalidCursor { .. }
        )
    }

    /// The offending parameter for validation errors.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
