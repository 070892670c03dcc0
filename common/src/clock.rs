use std::ops::Add;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Row keys derived from the clock are only as monotonic as the clock
/// itself, so tests inject a [`MockClock`] to pin them.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;

    /// The current time as a UTC datetime.
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now())
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug)]
pub struct MockClock {
    now: RwLock<SystemTime>,
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl MockClock {
    pub fn with_time(time: SystemTime) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    /// A clock frozen at `time`.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::with_time(SystemTime::from(time))
    }

    pub fn new() -> Self {
        Self::with_time(SystemTime::now())
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = now.add(duration);
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = SystemTime::from(time);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn should_report_pinned_time_as_utc() {
        // given
        let pinned = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();

        // when
        let clock = MockClock::at(pinned);

        // then
        assert_eq!(clock.utc_now(), pinned);
    }

    #[test]
    fn should_advance_and_reset() {
        // given
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        let clock = MockClock::at(start);

        // when
        clock.advance(Duration::from_millis(1500));

        // then
        assert_eq!(
            clock.utc_now(),
            start + chrono::Duration::milliseconds(1500)
        );
        clock.set_time(start);
        assert_eq!(clock.utc_now(), start);
    }
}
