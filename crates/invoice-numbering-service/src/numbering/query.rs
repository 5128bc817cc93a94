//! Read-only views: current sequence, ledger lookups and history.

use invoice_numbering_core::{
    CurrentSequence, HistoryFilter, HistoryPage, NumberLogEntry, OrganizationId, Period,
    ScopeKey, SequenceCounter, TenantId,
};

use super::InvoiceNumbering;
use crate::error::{NumberingError, Result};

impl InvoiceNumbering {
    /// The last issued sequence and number for a scope.
    ///
    /// Returns `(0, "")` when nothing was issued yet; never creates a counter.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an invalid period.
    pub async fn peek_current(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
    ) -> Result<CurrentSequence> {
        let scope = ScopeKey::new(tenant_id, organization_id, Period::new(year, month)?);
        self.blocking("peek_current", move |store| {
            store
                .get_counter(&scope)
                .map(|counter| counter.as_ref().map(CurrentSequence::from).unwrap_or_default())
                .map_err(|e| NumberingError::from_store(e, "peek_current", &scope.to_string()))
        })
        .await
    }

    /// Every counter a tenant owns, ordered by organization and period.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    pub async fn list_counters(&self, tenant_id: TenantId) -> Result<Vec<SequenceCounter>> {
        self.blocking("list_counters", move |store| {
            store
                .list_counters(tenant_id)
                .map_err(|e| NumberingError::from_store(e, "list_counters", &tenant_id.to_string()))
        })
        .await
    }

    /// Look up one issued number.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tenant never issued it.
    pub async fn find_number(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
    ) -> Result<NumberLogEntry> {
        let number = invoice_number.trim().to_string();
        self.blocking("find_number", move |store| {
            store
                .get_log_entry(tenant_id, &number)
                .map_err(|e| NumberingError::from_store(e, "find_number", &number))?
                .ok_or(NumberingError::NotFound {
                    entity: "invoice number",
                    id: number,
                })
        })
        .await
    }

    /// A page of a tenant's ledger.
    ///
    /// `filter.limit` is capped at the configured maximum; `total` counts
    /// all matches before paging.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a zero limit or a month outside 1..=12.
    pub async fn list_history(
        &self,
        tenant_id: TenantId,
        mut filter: HistoryFilter,
    ) -> Result<HistoryPage> {
        if let Some(month) = filter.month {
            if !(1..=12).contains(&month) {
                return Err(NumberingError::Validation(format!(
                    "month filter must be 1..=12, got {month}"
                )));
            }
        }
        if filter.limit == 0 {
            return Err(NumberingError::Validation("limit must be at least 1".into()));
        }
        filter.limit = filter.limit.min(self.history_max_limit);

        self.blocking("list_history", move |store| {
            store
                .list_log_entries(tenant_id, &filter)
                .map_err(|e| NumberingError::from_store(e, "list_history", &tenant_id.to_string()))
        })
        .await
    }
}
