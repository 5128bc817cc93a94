//! Core types for gapless, per-tenant invoice numbering.
//!
//! This crate holds the pieces that do not touch storage:
//!
//! - **Identifiers**: `TenantId`, `OrganizationId`, `NumberLogId`
//! - **Scopes**: `Period`, `ScopeKey`
//! - **Formatting**: `render`, `NumberFormat`
//! - **Counters**: `SequenceCounter`, `CurrentSequence`
//! - **Ledger**: `NumberLogEntry`, `NumberStatus`, `DocumentReference`, `HistoryFilter`
//!
//! # Numbering rules
//!
//! A counter is keyed by (tenant, organization, year, month). Each successful
//! issue advances it by exactly one and appends one ledger entry. Numbers are
//! never reused: voiding or cancelling an entry leaves the counter alone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod counter;
pub mod error;
pub mod format;
pub mod ids;
pub mod ledger;
pub mod period;

pub use counter::{CurrentSequence, SequenceCounter};
pub use error::{CoreError, Result};
pub use format::{render, NumberFormat, DEFAULT_TEMPLATE};
pub use ids::{IdError, NumberLogId, OrganizationId, TenantId};
pub use ledger::{
    DocumentReference, HistoryFilter, HistoryPage, NumberLogEntry, NumberStatus, SortOrder,
};
pub use period::{Period, ScopeKey};
