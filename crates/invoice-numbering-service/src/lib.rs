//! Invoice Numbering Service
//!
//! Issues gapless, per-period invoice numbers for multi-tenant billing,
//! tracks each issued number in an append-only ledger, and answers history
//! queries over it.
//!
//! # Guarantees
//!
//! - Each `(tenant, organization, year, month)` scope has its own counter.
//!   Concurrent calls on one scope get distinct consecutive sequences; calls
//!   on different scopes never wait on each other.
//! - A number is never skipped or reused. Voiding or cancelling it leaves
//!   the counter alone.
//! - A timed-out or dropped call leaves the store either fully advanced
//!   (counter and ledger entry) or untouched.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use invoice_numbering_core::{OrganizationId, TenantId};
//! use invoice_numbering_service::{InvoiceNumbering, ServiceConfig};
//! use invoice_numbering_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = InvoiceNumbering::new(Arc::new(MemoryStore::new()), &ServiceConfig::default())?;
//!
//! let issued = service
//!     .generate_next(TenantId::new(1), OrganizationId::new(1), 2025, 1)
//!     .await?;
//! assert_eq!(issued.invoice_number, "INV-2025-0001");
//!
//! service
//!     .void_number(TenantId::new(1), &issued.invoice_number, "duplicate draft")
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod locks;
pub mod numbering;
pub mod retry;

pub use collaborators::{
    AuditEvent, AuditSink, Clock, CollaboratorError, OpenDirectory, SystemClock, TenantDirectory,
    TracingAuditSink,
};
pub use config::{ConfigError, ServiceConfig};
pub use error::{ErrorKind, NumberingError, Result};
pub use locks::{ScopeGuard, ScopeLocks};
pub use numbering::InvoiceNumbering;
pub use retry::RetryPolicy;
