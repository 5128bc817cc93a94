//! Error types for invoice numbering core rules.

use crate::ids::IdError;
use crate::ledger::NumberStatus;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the pure rules in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Year or month outside the supported range.
    #[error("invalid billing period: year={year}, month={month}")]
    InvalidPeriod {
        /// The rejected year.
        year: i32,
        /// The rejected month.
        month: u32,
    },

    /// The number template cannot be used for issuing numbers.
    #[error("invalid number template {template:?}: {reason}")]
    InvalidTemplate {
        /// The rejected template.
        template: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A document reference could not be parsed.
    #[error("invalid document reference: {0}")]
    InvalidReference(String),

    /// Unknown ledger status name.
    #[error("unknown number status: {0:?}")]
    InvalidStatus(String),

    /// Ledger status transitions are one-way out of `active`.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: NumberStatus,
        /// The requested status.
        to: NumberStatus,
    },

    /// The entry already references a business document.
    #[error("invoice number {invoice_number} is already linked to a document")]
    ReferenceAlreadySet {
        /// The rendered number.
        invoice_number: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
