//! Clock abstraction for determinism.

use chrono::{Local, NaiveDateTime};

/// Abstraction over system time for deterministic behavior.
///
/// Event and audit timestamps are local date-times, matching the wire format.
pub trait Clock: Send + Sync {
    /// Returns the current local date-time.
    fn now(&self) -> NaiveDateTime;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
