//! Time source shared by the engine, the break scheduler and the archiver.
//!
//! Everything that reads the wall clock goes through [`Clock`] so tests can
//! move time forward without sleeping.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time in the floor's local timezone.
    fn local_now(&self) -> NaiveDateTime;

    /// Convert a stored instant into floor-local wall time.
    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime;
}

/// The host clock, using the process timezone for local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&Local).naive_local()
    }
}

/// A settable clock whose local timezone is UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the given local wall time, e.g. `"2024-03-04 09:15:00"`.
    pub fn at_local(local: &str) -> crate::error::Result<Self> {
        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            crate::error::Error::InvalidArgument(format!("invalid timestamp '{local}': {e}"))
        })?;
        Ok(Self::new(naive.and_utc()))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.lock().naive_utc()
    }

    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_local("2024-03-04 09:15:00").unwrap();
        assert_eq!(clock.local_now().hour(), 9);
        clock.advance(Duration::minutes(50));
        assert_eq!(clock.local_now().hour(), 10);
        assert_eq!(clock.local_now().minute(), 5);
    }

    #[test]
    fn manual_clock_rejects_garbage() {
        assert!(ManualClock::at_local("tomorrow").is_err());
    }
}
