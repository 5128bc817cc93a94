//! In-memory storage implementation.
//!
//! Counters and ledger entries live in sharded `DashMap`s. An issue holds the
//! counter's shard lock while it checks and inserts the ledger entry, so the
//! compare-and-increment is atomic per scope without a global lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use invoice_numbering_core::{
    HistoryFilter, HistoryPage, NumberFormat, NumberLogEntry, OrganizationId, ScopeKey,
    SequenceCounter, TenantId,
};

use crate::error::{Result, StoreError};
use crate::{EntryUpdate, Store};

/// `DashMap`-backed storage implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<ScopeKey, SequenceCounter>,
    logs: DashMap<(TenantId, String), NumberLogEntry>,
    formats: DashMap<(TenantId, OrganizationId), NumberFormat>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_log(&self, entry: &NumberLogEntry) -> Result<()> {
        match self
            .logs
            .entry((entry.tenant_id, entry.invoice_number.clone()))
        {
            Entry::Occupied(_) => Err(StoreError::DuplicateNumber {
                invoice_number: entry.invoice_number.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(())
            }
        }
    }
}

fn counter_conflict(scope: &ScopeKey) -> StoreError {
    tracing::debug!(%scope, "Counter moved since it was read");
    StoreError::Conflict {
        entity: "counter",
        id: scope.to_string(),
    }
}

impl Store for MemoryStore {
    fn get_counter(&self, scope: &ScopeKey) -> Result<Option<SequenceCounter>> {
        Ok(self.counters.get(scope).map(|c| c.value().clone()))
    }

    fn list_counters(&self, tenant_id: TenantId) -> Result<Vec<SequenceCounter>> {
        let mut counters: Vec<_> = self
            .counters
            .iter()
            .filter(|c| c.key().tenant_id == tenant_id)
            .map(|c| c.value().clone())
            .collect();
        counters.sort_by_key(|c| (c.scope.organization_id, c.scope.period));
        Ok(counters)
    }

    fn issue_number(&self, counter: &SequenceCounter, entry: &NumberLogEntry) -> Result<()> {
        let scope = counter.scope;
        let expected = counter.expected_previous();

        match self.counters.entry(scope) {
            Entry::Occupied(mut stored) => {
                if stored.get().sequence != expected {
                    return Err(counter_conflict(&scope));
                }
                self.insert_log(entry)?;
                stored.insert(counter.clone());
            }
            Entry::Vacant(slot) => {
                if expected != 0 {
                    return Err(counter_conflict(&scope));
                }
                self.insert_log(entry)?;
                slot.insert(counter.clone());
            }
        }

        Ok(())
    }

    fn get_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
    ) -> Result<Option<NumberLogEntry>> {
        Ok(self
            .logs
            .get(&(tenant_id, invoice_number.to_string()))
            .map(|e| e.value().clone()))
    }

    fn update_log_entry(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        update: EntryUpdate<'_>,
    ) -> Result<NumberLogEntry> {
        let mut stored = self
            .logs
            .get_mut(&(tenant_id, invoice_number.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                entity: "invoice number",
                id: invoice_number.to_string(),
            })?;

        let mut updated = stored.value().clone();
        update(&mut updated)?;
        *stored.value_mut() = updated.clone();

        Ok(updated)
    }

    fn list_log_entries(
        &self,
        tenant_id: TenantId,
        filter: &HistoryFilter,
    ) -> Result<HistoryPage> {
        let entries: Vec<_> = self
            .logs
            .iter()
            .filter(|e| e.key().0 == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(filter.apply(entries))
    }

    fn get_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<Option<NumberFormat>> {
        Ok(self
            .formats
            .get(&(tenant_id, organization_id))
            .map(|f| f.value().clone()))
    }

    fn put_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        format: &NumberFormat,
    ) -> Result<()> {
        self.formats
            .insert((tenant_id, organization_id), format.clone());
        Ok(())
    }
}
