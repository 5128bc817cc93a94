//! The invoice numbering service.
//!
//! [`InvoiceNumbering`] is cheap to clone and safe to share across tasks.
//! Clones share one lock table; separate instances built over the same
//! store still serialize through the store's compare-and-increment.

mod formats;
mod generate;
mod query;
mod status;

use std::sync::Arc;

use invoice_numbering_core::{NumberFormat, OrganizationId, TenantId};
use invoice_numbering_store::Store;

use crate::collaborators::{
    AuditEvent, AuditSink, Clock, OpenDirectory, SystemClock, TenantDirectory, TracingAuditSink,
};
use crate::config::ServiceConfig;
use crate::error::{NumberingError, Result};
use crate::locks::ScopeLocks;
use crate::retry::RetryPolicy;

/// Gapless invoice number issuing over a [`Store`].
#[derive(Clone)]
pub struct InvoiceNumbering {
    store: Arc<dyn Store>,
    directory: Arc<dyn TenantDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    locks: ScopeLocks,
    retry: RetryPolicy,
    default_format: Option<NumberFormat>,
    history_max_limit: usize,
}

impl InvoiceNumbering {
    /// Create a service with the default collaborators.
    ///
    /// # Errors
    ///
    /// Returns `NumberingError::Validation` if the configured default
    /// template is malformed.
    pub fn new(store: Arc<dyn Store>, config: &ServiceConfig) -> Result<Self> {
        let default_format = config
            .default_format
            .as_deref()
            .map(NumberFormat::parse)
            .transpose()?;

        Ok(Self {
            store,
            directory: Arc::new(OpenDirectory),
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            locks: ScopeLocks::new(),
            retry: config.retry_policy(),
            default_format,
            history_max_limit: config.history_max_limit.max(1),
        })
    }

    /// Use `directory` to check organizations.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn TenantDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Send audit events to `audit`.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Read time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The active retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Scopes currently held or awaited in this instance.
    #[must_use]
    pub fn active_scopes(&self) -> usize {
        self.locks.len()
    }

    /// Run a store call on the blocking pool.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| NumberingError::Internal(format!("{operation} task failed: {e}")))?
    }

    async fn ensure_organization(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<()> {
        match self
            .directory
            .organization_exists(tenant_id, organization_id)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(NumberingError::NotFound {
                entity: "organization",
                id: format!("tenant={tenant_id} org={organization_id}"),
            }),
            Err(e) => Err(NumberingError::Internal(format!(
                "tenant directory lookup failed: {e}"
            ))),
        }
    }

    async fn emit(&self, event: AuditEvent) {
        let name = event.name();
        if let Err(e) = self.audit.emit(event).await {
            tracing::warn!(event = name, error = %e, "Audit sink rejected event");
        }
    }
}
