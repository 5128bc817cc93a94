//! Seams to the systems around the numbering service.
//!
//! The service asks a [`TenantDirectory`] whether an organization exists,
//! reports every ledger change to an [`AuditSink`], and reads time from a
//! [`Clock`]. Defaults accept every organization, log audit events through
//! `tracing`, and use the system clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use invoice_numbering_core::{
    DocumentReference, NumberLogEntry, NumberStatus, OrganizationId, Period, TenantId,
};
use serde::Serialize;

/// Error returned by a collaborator.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Lookup of the organizations a tenant owns.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Whether `organization_id` exists under `tenant_id`.
    async fn organization_exists(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<bool, CollaboratorError>;
}

/// Directory that accepts every organization.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

#[async_trait]
impl TenantDirectory for OpenDirectory {
    async fn organization_exists(
        &self,
        _tenant_id: TenantId,
        _organization_id: OrganizationId,
    ) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}

/// A ledger change worth recording outside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A number was issued.
    NumberGenerated {
        /// Tenant.
        tenant_id: TenantId,
        /// Organization.
        organization_id: OrganizationId,
        /// Period of the counter.
        period: Period,
        /// Sequence value.
        sequence: u64,
        /// Rendered number.
        invoice_number: String,
        /// Linked document, if any.
        reference: Option<DocumentReference>,
        /// Issue time.
        at: DateTime<Utc>,
    },

    /// An issued number was voided.
    NumberVoided {
        /// Tenant.
        tenant_id: TenantId,
        /// Organization.
        organization_id: OrganizationId,
        /// Rendered number.
        invoice_number: String,
        /// Caller-supplied reason.
        reason: Option<String>,
        /// Change time.
        at: DateTime<Utc>,
    },

    /// An issued number was cancelled.
    NumberCancelled {
        /// Tenant.
        tenant_id: TenantId,
        /// Organization.
        organization_id: OrganizationId,
        /// Rendered number.
        invoice_number: String,
        /// Caller-supplied reason.
        reason: Option<String>,
        /// Change time.
        at: DateTime<Utc>,
    },

    /// An issued number was linked to its document.
    ReferenceAttached {
        /// Tenant.
        tenant_id: TenantId,
        /// Rendered number.
        invoice_number: String,
        /// Linked document.
        reference: DocumentReference,
        /// Change time.
        at: DateTime<Utc>,
    },

    /// An organization's template changed.
    FormatChanged {
        /// Tenant.
        tenant_id: TenantId,
        /// Organization.
        organization_id: OrganizationId,
        /// New template.
        template: String,
        /// Change time.
        at: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Event for a freshly issued entry.
    #[must_use]
    pub fn generated(entry: &NumberLogEntry) -> Self {
        Self::NumberGenerated {
            tenant_id: entry.tenant_id,
            organization_id: entry.organization_id,
            period: entry.period,
            sequence: entry.sequence,
            invoice_number: entry.invoice_number.clone(),
            reference: entry.reference,
            at: entry.generated_at,
        }
    }

    /// Event for an entry that left `active`.
    ///
    /// Returns `None` while the entry is still active.
    #[must_use]
    pub fn status_changed(entry: &NumberLogEntry) -> Option<Self> {
        let tenant_id = entry.tenant_id;
        let organization_id = entry.organization_id;
        let invoice_number = entry.invoice_number.clone();
        let reason = entry.status_reason.clone();
        let at = entry.status_changed_at?;
        match entry.status {
            NumberStatus::Active => None,
            NumberStatus::Voided => Some(Self::NumberVoided {
                tenant_id,
                organization_id,
                invoice_number,
                reason,
                at,
            }),
            NumberStatus::Cancelled => Some(Self::NumberCancelled {
                tenant_id,
                organization_id,
                invoice_number,
                reason,
                at,
            }),
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NumberGenerated { .. } => "number_generated",
            Self::NumberVoided { .. } => "number_voided",
            Self::NumberCancelled { .. } => "number_cancelled",
            Self::ReferenceAttached { .. } => "reference_attached",
            Self::FormatChanged { .. } => "format_changed",
        }
    }
}

/// Destination for audit events.
///
/// Emission happens after the change is committed; a failing sink is
/// logged and never undoes or fails the operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event.
    async fn emit(&self, event: AuditEvent) -> Result<(), CollaboratorError>;
}

/// Sink that writes events to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), CollaboratorError> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(
            target: "invoice_numbering::audit",
            event = event.name(),
            %payload,
            "Audit event"
        );
        Ok(())
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Now, in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
