//! Test clock: deterministic `Clock` implementation for tests.

use chrono::{NaiveDate, NaiveDateTime};
use userlog_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// A clock fixed at 2026-01-15 10:00:00, the timestamp used across tests.
    ///
    /// # Panics
    ///
    /// Never; the date is a valid constant.
    #[must_use]
    pub fn standard() -> Self {
        Self(
            NaiveDate::from_ymd_opt(2026, 1, 15)
                .and_then(|d| d.and_hms_opt(10, 0, 0))
                .expect("valid constant date"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
