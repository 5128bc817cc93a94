//! Key encoding utilities for `RocksDB`.
//!
//! Every key starts with the 8-byte big-endian tenant id, so a tenant's data
//! is one contiguous range and prefix scans never cross tenants.

use invoice_numbering_core::{OrganizationId, ScopeKey, TenantId};

/// Length of the tenant prefix.
pub const TENANT_PREFIX_LEN: usize = 8;

/// Create a counter key from a scope.
///
/// Format: `tenant (8) || org (8) || year (2) || month (1)`
#[must_use]
pub fn counter_key(scope: &ScopeKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(19);
    key.extend_from_slice(&scope.tenant_id.to_be_bytes());
    key.extend_from_slice(&scope.organization_id.to_be_bytes());
    key.extend_from_slice(&scope.period.to_key_bytes());
    key
}

/// Create a ledger key.
///
/// Format: `tenant (8) || invoice_number (utf-8)`
#[must_use]
pub fn log_key(tenant_id: TenantId, invoice_number: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(TENANT_PREFIX_LEN + invoice_number.len());
    key.extend_from_slice(&tenant_id.to_be_bytes());
    key.extend_from_slice(invoice_number.as_bytes());
    key
}

/// Create a format key.
///
/// Format: `tenant (8) || org (8)`
#[must_use]
pub fn format_key(tenant_id: TenantId, organization_id: OrganizationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&tenant_id.to_be_bytes());
    key.extend_from_slice(&organization_id.to_be_bytes());
    key
}

/// Create a prefix for iterating everything a tenant owns in one family.
#[must_use]
pub fn tenant_prefix(tenant_id: TenantId) -> Vec<u8> {
    tenant_id.to_be_bytes().to_vec()
}
