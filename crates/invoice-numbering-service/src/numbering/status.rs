//! Voiding, cancelling and linking issued numbers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use invoice_numbering_core::{DocumentReference, NumberLogEntry, NumberStatus, TenantId};
use invoice_numbering_store::StoreError;
use tracing::instrument;

use super::InvoiceNumbering;
use crate::collaborators::AuditEvent;
use crate::error::{NumberingError, Result};

impl InvoiceNumbering {
    /// Void an issued number. The number stays burned; the counter is not
    /// touched.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tenant never issued `invoice_number`.
    /// - `InvalidState` if it is already voided or cancelled.
    #[instrument(skip(self, reason))]
    pub async fn void_number(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        reason: &str,
    ) -> Result<NumberLogEntry> {
        self.close_number(tenant_id, invoice_number, NumberStatus::Voided, reason)
            .await
    }

    /// Cancel an issued number. Same rules as [`void_number`](Self::void_number).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tenant never issued `invoice_number`.
    /// - `InvalidState` if it is already voided or cancelled.
    #[instrument(skip(self, reason))]
    pub async fn cancel_number(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        reason: &str,
    ) -> Result<NumberLogEntry> {
        self.close_number(tenant_id, invoice_number, NumberStatus::Cancelled, reason)
            .await
    }

    /// Link an active number to the document that consumed it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tenant never issued `invoice_number`.
    /// - `InvalidState` if it is no longer active or already linked.
    #[instrument(skip(self))]
    pub async fn attach_reference(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        reference: DocumentReference,
    ) -> Result<NumberLogEntry> {
        let entry = self
            .update_entry("attach_reference", tenant_id, invoice_number, move |entry, _| {
                entry.attach_reference(reference)
            })
            .await?;

        tracing::info!(
            invoice_number = %entry.invoice_number,
            %reference,
            "Reference attached"
        );
        self.emit(AuditEvent::ReferenceAttached {
            tenant_id,
            invoice_number: entry.invoice_number.clone(),
            reference,
            at: self.clock.now(),
        })
        .await;
        Ok(entry)
    }

    async fn close_number(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        status: NumberStatus,
        reason: &str,
    ) -> Result<NumberLogEntry> {
        let operation = match status {
            NumberStatus::Cancelled => "cancel_number",
            _ => "void_number",
        };
        let reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());

        let entry = self
            .update_entry(operation, tenant_id, invoice_number, move |entry, now| {
                entry.transition(status, reason.clone(), now)
            })
            .await?;

        tracing::info!(
            invoice_number = %entry.invoice_number,
            organization_id = %entry.organization_id,
            sequence = entry.sequence,
            %status,
            "Invoice number closed"
        );
        if let Some(event) = AuditEvent::status_changed(&entry) {
            self.emit(event).await;
        }
        Ok(entry)
    }

    /// Apply `change` to one ledger entry atomically, retrying lost races.
    async fn update_entry<F>(
        &self,
        operation: &'static str,
        tenant_id: TenantId,
        invoice_number: &str,
        change: F,
    ) -> Result<NumberLogEntry>
    where
        F: Fn(&mut NumberLogEntry, DateTime<Utc>) -> invoice_numbering_core::Result<()>
            + Send
            + Sync
            + 'static,
    {
        let invoice_number = invoice_number.trim();
        if invoice_number.is_empty() {
            return Err(NumberingError::Validation(
                "invoice number must not be empty".into(),
            ));
        }

        let change = Arc::new(change);
        let mut attempt = 1;
        loop {
            let change = Arc::clone(&change);
            let number = invoice_number.to_string();
            let now = self.clock.now();

            let outcome = self
                .blocking(operation, move |store| {
                    store
                        .update_log_entry(tenant_id, &number, &|entry: &mut NumberLogEntry| {
                            (*change)(entry, now).map_err(StoreError::from)
                        })
                        .map_err(|e| NumberingError::from_store(e, operation, &number))
                })
                .await;

            match outcome {
                Err(NumberingError::Conflict { .. }) if self.retry.should_retry(attempt) => {
                    tracing::debug!(attempt, invoice_number, "Ledger entry contended, retrying");
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(NumberingError::Conflict { .. }) => {
                    return Err(NumberingError::Conflict {
                        scope: invoice_number.to_string(),
                        attempts: attempt,
                    });
                }
                other => return other,
            }
        }
    }
}
