//! Error types for invoice numbering storage.

use invoice_numbering_core::CoreError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A concurrent writer changed the record first. Safe to retry.
    #[error("write conflict on {entity} {id}")]
    Conflict {
        /// Kind of record.
        entity: &'static str,
        /// Identifier of the contended record.
        id: String,
    },

    /// The rendered number already exists in the tenant's ledger.
    #[error("duplicate invoice number: {invoice_number}")]
    DuplicateNumber {
        /// The number that was already issued.
        invoice_number: String,
    },

    /// A core rule refused the update; nothing was written.
    #[error(transparent)]
    Rejected(#[from] CoreError),
}
