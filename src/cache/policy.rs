//! Wall-clock validity for cached analyses. An entry is valid until the
//! first refresh boundary after its creation, not for a fixed duration,
//! so all entries written between two boundaries expire together.

use chrono::{DateTime, Duration, Utc};

/// Assigns each instant a validity boundary: the next occurrence of
/// `refresh_hour:00` UTC strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPolicy {
    refresh_hour: u32,
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self { refresh_hour: 12 }
    }
}

impl ValidityPolicy {
    /// `refresh_hour` must be a valid hour of day (0–23).
    pub fn new(refresh_hour: u32) -> Self {
        assert!(refresh_hour < 24, "refresh hour must be in 0..24");
        Self { refresh_hour }
    }

    /// First `refresh_hour:00:00` strictly after `after`. An entry created
    /// exactly on a boundary lives until the next one, a full day later.
    pub fn next_boundary(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let same_day = after
            .date_naive()
            .and_hms_opt(self.refresh_hour, 0, 0)
            .expect("refresh hour validated in constructor")
            .and_utc();
        if same_day > after {
            same_day
        } else {
            same_day + Duration::days(1)
        }
    }

    /// Whether an entry created at `created` is still valid at `now`.
    pub fn is_valid(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < self.next_boundary(created)
    }
}
