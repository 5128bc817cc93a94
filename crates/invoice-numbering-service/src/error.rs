//! Service error types.
//!
//! Callers branch on [`NumberingError::kind`]: retry on `Conflict` when
//! [`NumberingError::is_retryable`] says so, and map the rest to their own
//! boundary (404 / 409 / 400 / 500 or equivalent).

use invoice_numbering_core::{CoreError, NumberStatus};
use invoice_numbering_store::StoreError;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, NumberingError>;

/// Coarse error category for boundary mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A scope, entry or collaborator record is absent.
    NotFound,
    /// Serialization could not complete or the number already exists.
    Conflict,
    /// Illegal status transition.
    InvalidState,
    /// Malformed input.
    Validation,
    /// Storage or runtime failure.
    Internal,
}

impl ErrorKind {
    /// Snake-case name for machine-readable output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidState => "invalid_state",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

/// Service error type.
#[derive(Debug, thiserror::Error)]
pub enum NumberingError {
    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The retry budget ran out while competing writers kept winning.
    #[error("could not serialize {scope} after {attempts} attempts")]
    Conflict {
        /// Scope or number that was contended.
        scope: String,
        /// Attempts made.
        attempts: u32,
    },

    /// The rendered number is already in the tenant's ledger.
    #[error("invoice number {invoice_number} was already issued")]
    DuplicateNumber {
        /// The colliding number.
        invoice_number: String,
    },

    /// Illegal status transition or reference change.
    #[error("invoice number {invoice_number} is {status}: {detail}")]
    InvalidState {
        /// The number whose entry refused the change.
        invoice_number: String,
        /// Its current status.
        status: NumberStatus,
        /// What was refused.
        detail: String,
    },

    /// Malformed input (template, period, reference, id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage failure, with the operation and scope it hit.
    #[error("storage failure during {operation} ({context}): {source}")]
    Storage {
        /// Service operation that failed.
        operation: &'static str,
        /// Scope key or number involved.
        context: String,
        /// Underlying error.
        #[source]
        source: StoreError,
    },

    /// Runtime or collaborator failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NumberingError {
    /// The boundary category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } | Self::DuplicateNumber { .. } => ErrorKind::Conflict,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Wrap a storage error with the operation and the scope or number it hit.
    pub(crate) fn from_store(err: StoreError, operation: &'static str, context: &str) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Conflict { .. } => Self::Conflict {
                scope: context.to_string(),
                attempts: 1,
            },
            StoreError::DuplicateNumber { invoice_number } => {
                Self::DuplicateNumber { invoice_number }
            }
            StoreError::Rejected(CoreError::InvalidTransition { from, to }) => Self::InvalidState {
                invoice_number: context.to_string(),
                status: from,
                detail: format!("cannot change status to {to}"),
            },
            StoreError::Rejected(CoreError::ReferenceAlreadySet { invoice_number }) => {
                Self::InvalidState {
                    invoice_number,
                    status: NumberStatus::Active,
                    detail: "already linked to a document".to_string(),
                }
            }
            StoreError::Rejected(core) => core.into(),
            err @ (StoreError::Database(_) | StoreError::Serialization(_)) => Self::Storage {
                operation,
                context: context.to_string(),
                source: err,
            },
        }
    }
}

impl From<CoreError> for NumberingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { from, to } => Self::InvalidState {
                invoice_number: String::new(),
                status: from,
                detail: format!("cannot change status to {to}"),
            },
            CoreError::ReferenceAlreadySet { invoice_number } => Self::InvalidState {
                invoice_number,
                status: NumberStatus::Active,
                detail: "already linked to a document".to_string(),
            },
            other => Self::Validation(other.to_string()),
        }
    }
}
