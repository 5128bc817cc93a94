//! Issuing numbers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use invoice_numbering_core::{
    DocumentReference, NumberFormat, NumberLogEntry, OrganizationId, Period, ScopeKey,
    SequenceCounter, TenantId,
};
use invoice_numbering_store::Store;
use tracing::{instrument, Instrument};

use super::InvoiceNumbering;
use crate::collaborators::AuditEvent;
use crate::error::{NumberingError, Result};
use crate::locks::ScopeGuard;

impl InvoiceNumbering {
    /// Issue the next number for `(tenant, org, year, month)`.
    ///
    /// The returned entry carries the rendered `invoice_number` and its
    /// `sequence`.
    ///
    /// # Errors
    ///
    /// - `Validation` for an invalid period or an exhausted sequence.
    /// - `NotFound` for an unknown organization or when no format applies.
    /// - `Conflict` once the retry budget is spent.
    /// - `DuplicateNumber` if the rendered number was issued before.
    pub async fn generate_next(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
    ) -> Result<NumberLogEntry> {
        self.generate_next_with_reference(tenant_id, organization_id, year, month, None)
            .await
    }

    /// Issue the next number and record the document that consumes it.
    ///
    /// # Errors
    ///
    /// Same as [`generate_next`](Self::generate_next).
    pub async fn generate_next_with_reference(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
        reference: Option<DocumentReference>,
    ) -> Result<NumberLogEntry> {
        let period = Period::new(year, month)?;
        self.issue(ScopeKey::new(tenant_id, organization_id, period), reference)
            .await
    }

    /// Issue the next number in the clock's current period.
    ///
    /// # Errors
    ///
    /// Same as [`generate_next`](Self::generate_next).
    pub async fn generate_current(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        reference: Option<DocumentReference>,
    ) -> Result<NumberLogEntry> {
        let period = Period::containing(self.clock.now());
        self.issue(ScopeKey::new(tenant_id, organization_id, period), reference)
            .await
    }

    #[instrument(
        skip(self, scope, reference),
        fields(
            tenant_id = %scope.tenant_id,
            organization_id = %scope.organization_id,
            period = %scope.period,
        )
    )]
    async fn issue(
        &self,
        scope: ScopeKey,
        reference: Option<DocumentReference>,
    ) -> Result<NumberLogEntry> {
        self.ensure_organization(scope.tenant_id, scope.organization_id)
            .await?;

        let guard = self.locks.acquire(scope).await;

        // Once the scope is held the rest runs detached: a caller that gives
        // up still gets its number committed, released and audited.
        let service = self.clone();
        tokio::spawn(
            async move { service.issue_locked(guard, scope, reference).await }.in_current_span(),
        )
        .await
        .map_err(|e| NumberingError::Internal(format!("generate_next task failed: {e}")))?
    }

    async fn issue_locked(
        &self,
        mut guard: ScopeGuard,
        scope: ScopeKey,
        reference: Option<DocumentReference>,
    ) -> Result<NumberLogEntry> {
        let mut attempt = 1;
        loop {
            let store = Arc::clone(&self.store);
            let default_format = self.default_format.clone();
            let now = self.clock.now();

            // The guard travels with the commit so the scope stays locked
            // until the blocking task finishes.
            let (returned, outcome) = tokio::task::spawn_blocking(move || {
                let outcome = issue_once(
                    store.as_ref(),
                    scope,
                    default_format.as_ref(),
                    reference,
                    now,
                );
                (guard, outcome)
            })
            .await
            .map_err(|e| NumberingError::Internal(format!("generate_next task failed: {e}")))?;
            guard = returned;

            match outcome {
                Ok(entry) => {
                    drop(guard);
                    tracing::info!(
                        invoice_number = %entry.invoice_number,
                        sequence = entry.sequence,
                        attempt,
                        "Invoice number generated"
                    );
                    self.emit(AuditEvent::generated(&entry)).await;
                    return Ok(entry);
                }
                Err(NumberingError::Conflict { .. }) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    tracing::debug!(
                        attempt,
                        delay_us = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX),
                        "Counter moved underneath us, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(NumberingError::Conflict { .. }) => {
                    tracing::warn!(attempts = attempt, "Retry budget exhausted");
                    return Err(NumberingError::Conflict {
                        scope: scope.to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One read-advance-commit attempt.
fn issue_once(
    store: &dyn Store,
    scope: ScopeKey,
    default_format: Option<&NumberFormat>,
    reference: Option<DocumentReference>,
    now: DateTime<Utc>,
) -> Result<NumberLogEntry> {
    let context = scope.to_string();
    let storage = |e| NumberingError::from_store(e, "generate_next", &context);

    let counter = match store.get_counter(&scope).map_err(storage)? {
        Some(counter) => counter,
        None => {
            let configured = store
                .get_format(scope.tenant_id, scope.organization_id)
                .map_err(storage)?;
            let format = configured
                .or_else(|| default_format.cloned())
                .ok_or_else(|| NumberingError::NotFound {
                    entity: "number format",
                    id: context.clone(),
                })?;
            SequenceCounter::new(scope, format, now)
        }
    };

    let next = counter.advanced(now).ok_or_else(|| {
        NumberingError::Validation(format!("sequence space exhausted for {context}"))
    })?;
    let entry = NumberLogEntry::issued(&next, reference, now);
    store.issue_number(&next, &entry).map_err(storage)?;
    Ok(entry)
}
