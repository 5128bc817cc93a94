//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Sequence counters, keyed by `tenant || org || year || month`.
    pub const INVOICE_NUMBERS: &str = "invoice_numbers";

    /// Ledger entries, keyed by `tenant || invoice_number`.
    ///
    /// The key doubles as the per-tenant uniqueness constraint.
    pub const INVOICE_NUMBER_LOGS: &str = "invoice_number_logs";

    /// Configured templates, keyed by `tenant || org`.
    pub const NUMBER_FORMATS: &str = "number_formats";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::INVOICE_NUMBERS,
        cf::INVOICE_NUMBER_LOGS,
        cf::NUMBER_FORMATS,
    ]
}
