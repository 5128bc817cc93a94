//! Per-organization number templates.

use invoice_numbering_core::{NumberFormat, OrganizationId, TenantId};

use super::InvoiceNumbering;
use crate::collaborators::AuditEvent;
use crate::error::{NumberingError, Result};

impl InvoiceNumbering {
    /// Validate and store the template for an organization.
    ///
    /// Counters that already exist keep the template they were created with.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed template.
    /// - `NotFound` for an unknown organization.
    pub async fn set_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        template: &str,
    ) -> Result<NumberFormat> {
        let format = NumberFormat::parse(template)?;
        self.ensure_organization(tenant_id, organization_id).await?;

        let stored = format.clone();
        self.blocking("set_format", move |store| {
            store
                .put_format(tenant_id, organization_id, &stored)
                .map_err(|e| {
                    NumberingError::from_store(
                        e,
                        "set_format",
                        &format!("tenant={tenant_id} org={organization_id}"),
                    )
                })
        })
        .await?;

        tracing::info!(
            %tenant_id,
            %organization_id,
            template = format.as_str(),
            "Number format updated"
        );
        self.emit(AuditEvent::FormatChanged {
            tenant_id,
            organization_id,
            template: format.as_str().to_string(),
            at: self.clock.now(),
        })
        .await;
        Ok(format)
    }

    /// The template new counters of an organization would use: the
    /// configured one, else the service default.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    pub async fn get_format(
        &self,
        tenant_id: TenantId,
        organization_id: OrganizationId,
    ) -> Result<Option<NumberFormat>> {
        let configured = self
            .blocking("get_format", move |store| {
                store.get_format(tenant_id, organization_id).map_err(|e| {
                    NumberingError::from_store(
                        e,
                        "get_format",
                        &format!("tenant={tenant_id} org={organization_id}"),
                    )
                })
            })
            .await?;
        Ok(configured.or_else(|| self.default_format.clone()))
    }
}
