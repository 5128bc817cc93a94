//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Writes that must be atomic run inside optimistic transactions: every key
//! they depend on is read with `get_for_update`, and the commit fails with
//! `Busy` if another transaction wrote one of those keys in the meantime.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    OptimisticTransactionDB, Options,
};

use invoice_numbering_core::{
    HistoryFilter, HistoryPage, NumberFormat, NumberLogEntry, OrganizationId, ScopeKey,
    SequenceCounter, TenantId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{EntryUpdate, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<OptimisticTransactionDB<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let path = path.as_ref();
        let db = OptimisticTransactionDB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Opened RocksDB store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Map a transaction error, turning lost optimistic races into conflicts.
    fn txn_error(e: &rocksdb::Error, entity: &'static str, id: impl Into<String>) -> StoreError {
        match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Conflict {
                entity,
                id: id.into(),
            },
            _ => StoreError::Database(e.to_string()),
        }
    }

    /// Collect every value under a tenant prefix.
    fn scan_tenant(&self, family: &str, tenant_id: TenantId) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(family)?;
        let prefix = keys::tenant_prefix(tenant_id);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            values.push(value);
        }

        Ok(values)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Counter Operations
    // =========================================================================

    fn get_counter(&self, scope: &ScopeKey) -> Result<Option<SequenceCounter>> {
        let cf = self.cf(cf::INVOICE_NUMBERS)?;
        let key = keys::counter_key(scope);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_counters(&self, tenant_id: TenantId) -> Result<Vec<SequenceCounter>> {
        self.scan_tenant(cf::INVOICE_NUMBERS, tenant_id)?
            .iter()
            .map(|data| Self::deserialize(data))
            .collect()
    }

    // =========================================================================
    // Issue (compare-and-increment)
    // =========================================================================

    fn issue_number(&self, counter: &SequenceCounter, entry: &NumberLogEntry) -> Result<()> {
        let cf_counters = self.cf(cf::INVOICE_NUMBERS)?;
        let cf_logs = self.cf(cf::INVOICE_NUMBER_LOGS)?;

        let scope = counter.scope;
        let counter_key = keys::counter_key(&scope);
        let log_key = keys::log_key(entry.tenant_id, &entry.invoice_number);

        let conflict = |e: &rocksdb::Error| Self::txn_error(e, "counter", scope.to_string());

        let txn = self.db.transaction();

        // Compare: the stored counter must still be where the caller read it.
        let stored = txn
            .get_for_update_cf(&cf_counters, &counter_key, true)
            .map_err(|e| conflict(&e))?
            .map(|data| Self::deserialize::<SequenceCounter>(&data))
            .transpose()?;
        let stored_sequence = stored.map_or(0, |c| c.sequence);
        if stored_sequence != counter.expected_previous() {
            tracing::debug!(
                %scope,
                stored = stored_sequence,
                expected = counter.expected_previous(),
                "Counter moved since it was read"
            );
            return Err(StoreError::Conflict {
                entity: "counter",
                id: scope.to_string(),
            });
        }

        // Uniqueness of the rendered number within the tenant.
        if txn
            .get_for_update_cf(&cf_logs, &log_key, true)
            .map_err(|e| conflict(&e))?
            .is_some()
        {
            return Err(StoreError::DuplicateNumber {
                invoice_number: entry.invoice_number.clone(),
            });
        }

        let counter_value = Self::serialize(counter)?;
        let entry_value = Self::serialize(entry)?;

        txn.put_cf(&cf_counters, &counter_key, &counter_value)
            .map_err(|e| conflict(&e))?;
        txn.put_cf(&cf_logs, &log_key, &entry_value)
            .map_err(|e| conflict(&e))?;

        txn.commit().map_err(|e| conflict(&e))?;

        Ok(())
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn get_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
    ) -> Result<Option<NumberLogEntry>> {
        let cf = self.cf(cf::INVOICE_NUMBER_LOGS)?;
        let key = keys::log_key(tenant_id, invoice_number);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn update_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        update: EntryUpdate<'_>,
    ) -> Result<NumberLogEntry> {
        let cf = self.cf(cf::INVOICE_NUMBER_LOGS)?;
        let key = keys::log_key(tenant_id, invoice_number);
        let conflict = |e: &rocksdb::Error| Self::txn_error(e, "invoice number", invoice_number);

        let txn = self.db.transaction();

        let mut entry: NumberLogEntry = txn
            .get_for_update_cf(&cf, &key, true)
            .map_err(|e| conflict(&e))?
            .map(|data| Self::deserialize(&data))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "invoice number",
                id: invoice_number.to_string(),
            })?;

        update(&mut entry)?;

        let value = Self::serialize(&entry)?;
        txn.put_cf(&cf, &key, &value).map_err(|e| conflict(&e))?;
        txn.commit().map_err(|e| conflict(&e))?;

        Ok(entry)
    }

    fn list_log_entries(
        &self,
        tenant_id: TenantId,
        filter: &HistoryFilter,
    ) -> Result<HistoryPage> {
        let entries = self
            .scan_tenant(cf::INVOICE_NUMBER_LOGS, tenant_id)?
            .iter()
            .map(|data| Self::deserialize(data))
            .collect::<Result<Vec<NumberLogEntry>>>()?;

        Ok(filter.apply(entries))
    }

    // =========================================================================
    // Format Operations
    // =========================================================================

    fn get_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<Option<NumberFormat>> {
        let cf = self.cf(cf::NUMBER_FORMATS)?;
        let key = keys::format_key(tenant_id, organization_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        format: &NumberFormat,
    ) -> Result<()> {
        let cf = self.cf(cf::NUMBER_FORMATS)?;
        let key = keys::format_key(tenant_id, organization_id);
        let value = Self::serialize(format)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
