//! The number ledger.
//!
//! Every issued number gets exactly one entry, written in the same atomic
//! unit as the counter advance. Entries are never deleted; their status can
//! leave `active` once and never come back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::counter::SequenceCounter;
use crate::error::{CoreError, Result};
use crate::ids::{NumberLogId, OrganizationId, TenantId};
use crate::period::Period;

/// Lifecycle status of an issued number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStatus {
    /// Issued and usable.
    Active,
    /// Burned: kept in the ledger, never reissued.
    Voided,
    /// Withdrawn before use; also never reissued.
    Cancelled,
}

impl NumberStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Lowercase name as stored and displayed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Voided => "voided",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NumberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "voided" => Ok(Self::Voided),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// The business document that consumed a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DocumentReference {
    /// An invoice.
    Invoice(u64),
    /// A credit note.
    CreditNote(u64),
}

impl DocumentReference {
    /// Parse the loosely typed `(reference_type, reference_id)` pair used by
    /// surrounding modules.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidReference` for an unknown type.
    pub fn parse(reference_type: &str, reference_id: u64) -> Result<Self> {
        match reference_type.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(Self::Invoice(reference_id)),
            "credit_note" | "credit-note" | "creditnote" => Ok(Self::CreditNote(reference_id)),
            other => Err(CoreError::InvalidReference(format!(
                "unknown reference type {other:?}"
            ))),
        }
    }

    /// The referenced document id.
    #[must_use]
    pub const fn id(self) -> u64 {
        match self {
            Self::Invoice(id) | Self::CreditNote(id) => id,
        }
    }

    /// The reference type name.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Invoice(_) => "invoice",
            Self::CreditNote(_) => "credit_note",
        }
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// A ledger row for one issued number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLogEntry {
    /// Time-ordered entry id.
    pub id: NumberLogId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Organization the number was issued for.
    pub organization_id: OrganizationId,
    /// The rendered number, unique per tenant.
    pub invoice_number: String,
    /// Billing period of the counter that produced it.
    pub period: Period,
    /// The sequence that produced it.
    pub sequence: u64,
    /// The consuming document, once known.
    pub reference: Option<DocumentReference>,
    /// Lifecycle status.
    pub status: NumberStatus,
    /// Reason given when the status left `active`.
    pub status_reason: Option<String>,
    /// When the status left `active`.
    pub status_changed_at: Option<DateTime<Utc>>,
    /// When the number was issued.
    pub generated_at: DateTime<Utc>,
}

impl NumberLogEntry {
    /// The active entry recording an advanced counter.
    #[must_use]
    pub fn issued(
        counter: &SequenceCounter,
        reference: Option<DocumentReference>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NumberLogId::generate(),
            tenant_id: counter.scope.tenant_id,
            organization_id: counter.scope.organization_id,
            invoice_number: counter.last_number.clone(),
            period: counter.scope.period,
            sequence: counter.sequence,
            reference,
            status: NumberStatus::Active,
            status_reason: None,
            status_changed_at: None,
            generated_at,
        }
    }

    /// Move the entry out of `active`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` unless the entry is active and
    /// the target is a final status.
    pub fn transition(
        &mut self,
        to: NumberStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.status.is_final() || !to.is_final() {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.status_reason = reason.filter(|r| !r.trim().is_empty());
        self.status_changed_at = Some(at);
        Ok(())
    }

    /// Link the entry to the document that consumed it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` if the entry is no longer
    /// active and `CoreError::ReferenceAlreadySet` if it already has one.
    pub fn attach_reference(&mut self, reference: DocumentReference) -> Result<()> {
        if self.status.is_final() {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: NumberStatus::Active,
            });
        }
        if self.reference.is_some() {
            return Err(CoreError::ReferenceAlreadySet {
                invoice_number: self.invoice_number.clone(),
            });
        }
        self.reference = Some(reference);
        Ok(())
    }
}

/// Ordering of history results by `generated_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}

/// Filters and paging for a history query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Restrict to one organization.
    pub organization_id: Option<OrganizationId>,
    /// Restrict to one year.
    pub year: Option<i32>,
    /// Restrict to one month.
    pub month: Option<u32>,
    /// Restrict to one status.
    pub status: Option<NumberStatus>,
    /// Sort order.
    pub order: SortOrder,
    /// Page size.
    pub limit: usize,
    /// Entries to skip.
    pub offset: usize,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            organization_id: None,
            year: None,
            month: None,
            status: None,
            order: SortOrder::Descending,
            limit: 50,
            offset: 0,
        }
    }
}

impl HistoryFilter {
    /// Whether an entry passes every filter.
    #[must_use]
    pub fn matches(&self, entry: &NumberLogEntry) -> bool {
        self.organization_id
            .map_or(true, |org| entry.organization_id == org)
            && self.year.map_or(true, |y| entry.period.year() == y)
            && self.month.map_or(true, |m| entry.period.month() == m)
            && self.status.map_or(true, |s| entry.status == s)
    }

    /// Filter, sort and page a tenant's entries.
    #[must_use]
    pub fn apply(&self, entries: impl IntoIterator<Item = NumberLogEntry>) -> HistoryPage {
        let mut matching: Vec<_> = entries.into_iter().filter(|e| self.matches(e)).collect();
        matching.sort_by(|a, b| {
            a.generated_at
                .cmp(&b.generated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if self.order == SortOrder::Descending {
            matching.reverse();
        }

        let total = matching.len();
        let entries = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();
        HistoryPage { entries, total }
    }
}

/// One page of history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Entries on this page.
    pub entries: Vec<NumberLogEntry>,
    /// Matching entries across all pages.
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{NumberFormat, ScopeKey};

    fn entry(org: u64, month: u32, sequence: u64, offset_secs: i64) -> NumberLogEntry {
        let scope = ScopeKey::new(
            TenantId::new(1),
            OrganizationId::new(org),
            Period::new(2025, month).unwrap(),
        );
        let base = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut counter = SequenceCounter::new(scope, NumberFormat::default_format(), base);
        counter.sequence = sequence - 1;
        let counter = counter.advanced(base).unwrap();
        NumberLogEntry::issued(&counter, None, base + Duration::seconds(offset_secs))
    }

    #[test]
    fn void_is_one_way() {
        let mut e = entry(1, 1, 1, 0);
        let now = Utc::now();
        e.transition(NumberStatus::Voided, Some("typo".into()), now)
            .unwrap();
        assert_eq!(e.status, NumberStatus::Voided);
        assert_eq!(e.status_reason.as_deref(), Some("typo"));
        assert_eq!(e.status_changed_at, Some(now));

        let err = e
            .transition(NumberStatus::Voided, None, now)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: NumberStatus::Voided,
                to: NumberStatus::Voided
            }
        );
        assert!(e.transition(NumberStatus::Cancelled, None, now).is_err());
    }

    #[test]
    fn cannot_transition_back_to_active() {
        let mut e = entry(1, 1, 1, 0);
        assert!(e.transition(NumberStatus::Active, None, Utc::now()).is_err());
        assert_eq!(e.status, NumberStatus::Active);
    }

    #[test]
    fn blank_reason_is_dropped() {
        let mut e = entry(1, 1, 1, 0);
        e.transition(NumberStatus::Cancelled, Some("  ".into()), Utc::now())
            .unwrap();
        assert_eq!(e.status_reason, None);
    }

    #[test]
    fn reference_attaches_once() {
        let mut e = entry(1, 1, 1, 0);
        e.attach_reference(DocumentReference::Invoice(10)).unwrap();
        assert!(matches!(
            e.attach_reference(DocumentReference::Invoice(11)),
            Err(CoreError::ReferenceAlreadySet { .. })
        ));

        let mut voided = entry(1, 1, 2, 0);
        voided
            .transition(NumberStatus::Voided, None, Utc::now())
            .unwrap();
        assert!(voided
            .attach_reference(DocumentReference::CreditNote(3))
            .is_err());
    }

    #[test]
    fn reference_parse_and_serde() {
        assert_eq!(
            DocumentReference::parse("Credit_Note", 4).unwrap(),
            DocumentReference::CreditNote(4)
        );
        assert!(DocumentReference::parse("receipt", 1).is_err());

        let json = serde_json::to_value(DocumentReference::Invoice(8)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "invoice", "id": 8 }));
    }

    #[test]
    fn history_filters_sorts_and_pages() {
        let entries = vec![
            entry(1, 1, 1, 0),
            entry(1, 1, 2, 10),
            entry(2, 1, 1, 20),
            entry(1, 2, 1, 30),
        ];

        let page = HistoryFilter::default().apply(entries.clone());
        assert_eq!(page.total, 4);
        assert_eq!(page.entries[0].period.month(), 2);

        let filter = HistoryFilter {
            organization_id: Some(OrganizationId::new(1)),
            month: Some(1),
            order: SortOrder::Ascending,
            limit: 1,
            offset: 1,
            ..HistoryFilter::default()
        };
        let page = filter.apply(entries);
        assert_eq!(page.total, 2);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].sequence, 2);
    }
}
