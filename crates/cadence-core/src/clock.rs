//! Wall-clock access for pacing and record timestamps.

use chrono::{DateTime, FixedOffset, Local, Offset, TimeDelta, Utc};

/// Source of the current instant and the local UTC offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Offset used to interpret local wall-clock hours.
    fn utc_offset(&self) -> FixedOffset;

    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.utc_offset())
    }
}

/// The host clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn utc_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// Clock that starts at a chosen instant and advances with tokio's time
/// source.
///
/// Under a paused tokio runtime (`#[tokio::test(start_paused = true)]`)
/// sleeps advance this clock instantly, which makes hour-long pacing waits
/// testable.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    origin: DateTime<Utc>,
    anchor: tokio::time::Instant,
    offset: FixedOffset,
}

impl SimulatedClock {
    pub fn new(origin: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
            offset,
        }
    }

    /// Start at `origin` with local time equal to UTC.
    pub fn utc(origin: DateTime<Utc>) -> Self {
        Self::new(origin, Utc.fix())
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or_default();
        self.origin + elapsed
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use std::time::Duration;

    #[test]
    fn test_system_clock_local_matches_utc_instant() {
        let clock = SystemClock;
        let local = clock.local_now();
        let drift = (local.with_timezone(&Utc) - clock.now()).num_seconds().abs();
        assert!(drift < 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_clock_follows_tokio_time() {
        let origin = Utc.with_ymd_and_hms(2026, 3, 1, 3, 0, 0).unwrap();
        let clock = SimulatedClock::utc(origin);
        assert_eq!(clock.now(), origin);

        tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
        assert_eq!(clock.now(), origin + TimeDelta::hours(5));
        assert_eq!(clock.local_now().hour(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_clock_applies_offset() {
        let origin = Utc.with_ymd_and_hms(2026, 3, 1, 22, 30, 0).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let clock = SimulatedClock::new(origin, offset);
        assert_eq!(clock.local_now().hour(), 0);
        assert_eq!(clock.utc_offset(), offset);
    }
}
