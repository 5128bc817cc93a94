//! Billing periods and the scope key that counters are partitioned on.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{OrganizationId, TenantId};

/// Earliest year a period may carry. `{YYYY}` renders four digits.
pub const MIN_YEAR: i32 = 1;

/// Latest year a period may carry.
pub const MAX_YEAR: i32 = 9999;

/// A calendar month used as a billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod", into = "RawPeriod")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a validated period.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidPeriod` if the year is outside
    /// `MIN_YEAR..=MAX_YEAR` or the month outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(CoreError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    /// The period containing the given instant (UTC).
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Four-digit year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month, 1-based.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Fixed-width key bytes: 2 bytes year, 1 byte month.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_key_bytes(self) -> [u8; 3] {
        let year = (self.year as u16).to_be_bytes();
        [year[0], year[1], self.month as u8]
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Serialize, Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = CoreError;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Self::new(raw.year, raw.month)
    }
}

impl From<Period> for RawPeriod {
    fn from(period: Period) -> Self {
        Self {
            year: period.year,
            month: period.month,
        }
    }
}

/// The tuple a sequence counter is keyed on.
///
/// Counters never span keys; every read, lock and write in the generator is
/// scoped to exactly one `ScopeKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Organization within the tenant.
    pub organization_id: OrganizationId,
    /// Billing period.
    pub period: Period,
}

impl ScopeKey {
    /// Build a scope key.
    #[must_use]
    pub const fn new(tenant_id: TenantId, organization_id: OrganizationId, period: Period) -> Self {
        Self {
            tenant_id,
            organization_id,
            period,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenant={} org={} period={}",
            self.tenant_id, self.organization_id, self.period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_out_of_range() {
        assert!(Period::new(2025, 0).is_err());
        assert!(Period::new(2025, 13).is_err());
        assert!(Period::new(0, 1).is_err());
        assert!(Period::new(10_000, 1).is_err());
        assert!(Period::new(9999, 12).is_ok());
    }

    #[test]
    fn containing_instant() {
        let at = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(Period::containing(at), Period::new(2025, 3).unwrap());
    }

    #[test]
    fn key_bytes_order_by_time() {
        let dec = Period::new(2024, 12).unwrap().to_key_bytes();
        let jan = Period::new(2025, 1).unwrap().to_key_bytes();
        assert!(dec < jan);
    }

    #[test]
    fn deserialize_validates() {
        let ok: Period = serde_json::from_str(r#"{"year":2025,"month":2}"#).unwrap();
        assert_eq!(ok.to_string(), "2025-02");
        assert!(serde_json::from_str::<Period>(r#"{"year":2025,"month":14}"#).is_err());
    }
}
