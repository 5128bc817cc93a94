//! Storage layer for invoice numbering.
//!
//! This crate persists sequence counters, ledger entries and configured
//! number formats. Two backends implement the [`Store`] trait:
//!
//! - [`RocksStore`] (feature `rocksdb-backend`, on by default): durable,
//!   optimistic transactions over column families
//! - [`MemoryStore`]: `DashMap` shards, for tests and embedding
//!
//! # Atomic issue
//!
//! [`Store::issue_number`] is a compare-and-increment: it writes the advanced
//! counter and the new ledger entry together, and only if the stored counter
//! still holds the sequence the caller read. A lost race surfaces as
//! [`StoreError::Conflict`] and nothing is written.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use invoice_numbering_core::{
//!     NumberFormat, NumberLogEntry, OrganizationId, Period, ScopeKey, SequenceCounter, TenantId,
//! };
//! use invoice_numbering_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let scope = ScopeKey::new(TenantId::new(1), OrganizationId::new(1), Period::new(2025, 1).unwrap());
//!
//! let now = Utc::now();
//! let counter = store
//!     .get_counter(&scope)
//!     .unwrap()
//!     .unwrap_or_else(|| SequenceCounter::new(scope, NumberFormat::default_format(), now));
//! let next = counter.advanced(now).unwrap();
//! let entry = NumberLogEntry::issued(&next, None, now);
//! store.issue_number(&next, &entry).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use invoice_numbering_core::{
    HistoryFilter, HistoryPage, NumberFormat, NumberLogEntry, OrganizationId, ScopeKey,
    SequenceCounter, TenantId,
};

/// An in-place change to one ledger entry, applied under the store's
/// isolation. Returning an error aborts the update.
pub type EntryUpdate<'a> = &'a dyn Fn(&mut NumberLogEntry) -> Result<()>;

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Counter Operations
    // =========================================================================

    /// Get the counter for a scope, if one was ever created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_counter(&self, scope: &ScopeKey) -> Result<Option<SequenceCounter>>;

    /// List every counter a tenant owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_counters(&self, tenant_id: TenantId) -> Result<Vec<SequenceCounter>>;

    // =========================================================================
    // Issue (compare-and-increment)
    // =========================================================================

    /// Persist an advanced counter together with its ledger entry.
    ///
    /// The write happens only if the stored counter holds
    /// `counter.expected_previous()` (a missing counter counts as 0) and
    /// the tenant has no entry for `entry.invoice_number`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict` if the counter moved or a concurrent
    ///   transaction touched the same keys.
    /// - `StoreError::DuplicateNumber` if the number is already in the ledger.
    fn issue_number(&self, counter: &SequenceCounter, entry: &NumberLogEntry) -> Result<()>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Get a ledger entry by tenant and rendered number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
    ) -> Result<Option<NumberLogEntry>>;

    /// Atomically read, modify and write one ledger entry.
    ///
    /// Returns the entry as written.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the entry doesn't exist.
    /// - `StoreError::Conflict` if a concurrent transaction won.
    /// - Whatever `update` returns; nothing is written in that case.
    fn update_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        update: EntryUpdate<'_>,
    ) -> Result<NumberLogEntry>;

    /// Query a tenant's ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_log_entries(&self, tenant_id: TenantId, filter: &HistoryFilter)
        -> Result<HistoryPage>;

    // =========================================================================
    // Format Operations
    // =========================================================================

    /// Get the configured format for an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<Option<NumberFormat>>;

    /// Insert or replace the configured format for an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        format: &NumberFormat,
    ) -> Result<()>;
}
