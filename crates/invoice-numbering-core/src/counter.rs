//! Sequence counters.
//!
//! One counter exists per scope key. It is created lazily by the first
//! generation in that scope and then only ever moves forward by one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::NumberFormat;
use crate::period::ScopeKey;

/// The durable counter for one scope key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    /// The scope this counter belongs to.
    pub scope: ScopeKey,

    /// Last issued sequence. Zero means nothing was issued yet.
    pub sequence: u64,

    /// The most recently rendered number (empty before the first issue).
    pub last_number: String,

    /// Template fixed for this scope when the counter was created.
    pub format: NumberFormat,

    /// When the counter was created.
    pub created_at: DateTime<Utc>,

    /// When the counter last advanced.
    pub updated_at: DateTime<Utc>,
}

impl SequenceCounter {
    /// A counter that has not issued anything yet.
    #[must_use]
    pub fn new(scope: ScopeKey, format: NumberFormat, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            sequence: 0,
            last_number: String::new(),
            format,
            created_at: now,
            updated_at: now,
        }
    }

    /// The counter as it will look after issuing the next number.
    ///
    /// Returns `None` once the sequence space is exhausted.
    #[must_use]
    pub fn advanced(&self, now: DateTime<Utc>) -> Option<Self> {
        let sequence = self.sequence.checked_add(1)?;
        Some(Self {
            scope: self.scope,
            sequence,
            last_number: self.format.render(self.scope.period, sequence),
            format: self.format.clone(),
            created_at: self.created_at,
            updated_at: now,
        })
    }

    /// The sequence this counter must hold in storage for `self` to be a
    /// valid successor.
    #[must_use]
    pub const fn expected_previous(&self) -> u64 {
        self.sequence.saturating_sub(1)
    }
}

/// Read-only view returned by a peek.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSequence {
    /// Last issued sequence (0 if the scope has no counter).
    pub sequence: u64,
    /// Last rendered number (empty if the scope has no counter).
    pub last_number: String,
}

impl From<&SequenceCounter> for CurrentSequence {
    fn from(counter: &SequenceCounter) -> Self {
        Self {
            sequence: counter.sequence,
            last_number: counter.last_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrganizationId, Period, TenantId};

    fn scope() -> ScopeKey {
        ScopeKey::new(
            TenantId::new(1),
            OrganizationId::new(1),
            Period::new(2025, 1).unwrap(),
        )
    }

    #[test]
    fn advance_renders_next_number() {
        let now = Utc::now();
        let counter = SequenceCounter::new(scope(), NumberFormat::default_format(), now);
        assert_eq!(CurrentSequence::from(&counter), CurrentSequence::default());

        let next = counter.advanced(now).unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(next.last_number, "INV-2025-0001");
        assert_eq!(next.expected_previous(), 0);

        let after = next.advanced(now).unwrap();
        assert_eq!(after.sequence, 2);
        assert_eq!(after.expected_previous(), 1);
    }

    #[test]
    fn advance_stops_at_exhaustion() {
        let now = Utc::now();
        let mut counter = SequenceCounter::new(scope(), NumberFormat::default_format(), now);
        counter.sequence = u64::MAX;
        assert!(counter.advanced(now).is_none());
    }
}
