//! Humanized pacing between engagement steps.
//!
//! Spreads a daily quota over the day with jittered gaps, occasional long
//! breaks and a waking-hours window. Every wait is cancellable and sleeps in
//! bounded checkpoints so a cancel is noticed promptly even during an
//! overnight suspension.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, Timelike, Utc};
use tracing::{debug, info};

use cadence_core::clock::Clock;
use cadence_core::config::{PacingConfig, MAX_WAIT_CHECKPOINT_SECS};
use cadence_core::random::RandomSource;
use cadence_core::types::ProbabilityPolicy;

use crate::cancel::CancelSignal;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Result of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Cancelled,
}

/// Local hours `[start_hour, end_hour)` during which actions may happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl WakingHours {
    pub fn contains(&self, local: DateTime<FixedOffset>) -> bool {
        let hour = local.hour();
        hour >= self.start_hour && hour < self.end_hour
    }

    /// The next start of the window strictly after a moment outside it.
    pub fn resume_at(&self, local: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
        let day = if local.hour() < self.start_hour {
            local.date_naive()
        } else {
            local.date_naive().succ_opt()?
        };
        day.and_hms_opt(self.start_hour, 0, 0)?
            .and_local_timezone(*local.offset())
            .single()
            .map(|resume| resume.with_timezone(&Utc))
    }
}

impl From<&PacingConfig> for WakingHours {
    fn from(config: &PacingConfig) -> Self {
        Self {
            start_hour: config.waking_start_hour,
            end_hour: config.waking_end_hour,
        }
    }
}

/// Computes delays and performs the waits between candidates.
pub struct PacingScheduler {
    min_gap_secs: f64,
    policy: ProbabilityPolicy,
    waking: WakingHours,
    checkpoint: Duration,
    clock: Arc<dyn Clock>,
    cancel: CancelSignal,
}

impl PacingScheduler {
    pub fn new(
        total_daily_quota: u32,
        policy: ProbabilityPolicy,
        pacing: &PacingConfig,
        clock: Arc<dyn Clock>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            min_gap_secs: Self::min_gap_for(total_daily_quota),
            policy,
            waking: WakingHours::from(pacing),
            checkpoint: Duration::from_secs(
                pacing
                    .max_wait_checkpoint_secs
                    .clamp(1, MAX_WAIT_CHECKPOINT_SECS),
            ),
            clock,
            cancel,
        }
    }

    /// Base gap in seconds for a day's worth of `total_daily_quota` actions.
    pub fn min_gap_for(total_daily_quota: u32) -> f64 {
        SECONDS_PER_DAY / (f64::from(total_daily_quota) + 1.0)
    }

    pub fn min_gap_secs(&self) -> f64 {
        self.min_gap_secs
    }

    pub fn waking_hours(&self) -> WakingHours {
        self.waking
    }

    /// Longest single sleep inside a wait.
    pub fn checkpoint(&self) -> Duration {
        self.checkpoint
    }

    /// `min_gap * U(0.7, 1.3) + U(2, 8)` seconds.
    pub fn next_delay(&self, rng: &mut dyn RandomSource) -> Duration {
        let secs = self.min_gap_secs * rng.uniform(0.7, 1.3) + rng.uniform(2.0, 8.0);
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// An extra pause, drawn with probability `long_break_prob`.
    pub fn maybe_long_break(&self, rng: &mut dyn RandomSource) -> Option<Duration> {
        if !rng.chance(self.policy.long_break_prob) {
            return None;
        }
        let [low, high] = self.policy.long_break_range;
        Some(Duration::from_secs_f64(rng.uniform(low, high).max(0.0)))
    }

    /// Suspend until the local clock is inside the waking window.
    pub async fn await_waking_hours(&self) -> WaitOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let local = self.clock.local_now();
            if self.waking.contains(local) {
                return WaitOutcome::Ready;
            }

            let resume = self
                .waking
                .resume_at(local)
                .unwrap_or_else(|| self.clock.now() + checkpoint_delta(self.checkpoint));
            info!(
                local_time = %local.format("%Y-%m-%d %H:%M"),
                resume_at = %resume,
                "Outside waking hours, suspending"
            );
            if self.sleep_until(resume).await == WaitOutcome::Cancelled {
                return WaitOutcome::Cancelled;
            }
        }
    }

    /// Sleep until the clock reaches `target`, waking at least once per
    /// checkpoint to check for cancellation.
    pub async fn sleep_until(&self, target: DateTime<Utc>) -> WaitOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let now = self.clock.now();
            if now >= target {
                return WaitOutcome::Ready;
            }
            let remaining = (target - now).to_std().unwrap_or_default();
            let step = remaining.min(self.checkpoint);

            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.cancel.cancelled() => return WaitOutcome::Cancelled,
            }
        }
    }

    /// Wait one paced step after `last` and return the instant to thread into
    /// the next call. `None` if cancelled while waiting.
    pub async fn advance_and_wait(
        &self,
        last: DateTime<Utc>,
        rng: &mut dyn RandomSource,
    ) -> Option<DateTime<Utc>> {
        let mut delay = self.next_delay(rng);
        if let Some(long_break) = self.maybe_long_break(rng) {
            debug!(secs = long_break.as_secs(), "Taking a long break");
            delay += long_break;
        }

        let target = last + TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero());
        debug!(delay_secs = delay.as_secs(), next_at = %target, "Pacing");

        if self.sleep_until(target).await == WaitOutcome::Cancelled {
            return None;
        }
        if self.await_waking_hours().await == WaitOutcome::Cancelled {
            return None;
        }
        Some(target.max(self.clock.now()))
    }
}

fn checkpoint_delta(checkpoint: Duration) -> TimeDelta {
    TimeDelta::from_std(checkpoint).unwrap_or(TimeDelta::minutes(15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::clock::SimulatedClock;
    use cadence_core::random::FixedRandom;
    use chrono::{Offset, TimeZone};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn scheduler_at(
        start: DateTime<Utc>,
        total: u32,
    ) -> (PacingScheduler, Arc<SimulatedClock>, CancelSignal) {
        let clock = Arc::new(SimulatedClock::utc(start));
        let cancel = CancelSignal::new();
        let scheduler = PacingScheduler::new(
            total,
            ProbabilityPolicy::default(),
            &PacingConfig::default(),
            clock.clone(),
            cancel.clone(),
        );
        (scheduler, clock, cancel)
    }

    #[test]
    fn test_min_gap() {
        assert_eq!(PacingScheduler::min_gap_for(3), 21_600.0);
        assert_eq!(PacingScheduler::min_gap_for(0), 86_400.0);
    }

    #[tokio::test]
    async fn test_next_delay_bounds() {
        let (scheduler, _, _) = scheduler_at(at(2024, 5, 1, 9, 0), 65);
        let gap = scheduler.min_gap_secs();

        let low = scheduler.next_delay(&mut FixedRandom::new(0.0));
        assert!((low.as_secs_f64() - (0.7 * gap + 2.0)).abs() < 1e-6);

        let high = scheduler.next_delay(&mut FixedRandom::new(1.0));
        assert!((high.as_secs_f64() - (1.3 * gap + 8.0)).abs() < 1e-6);

        let mut rng = cadence_core::random::SeededRandom::from_seed(11);
        for _ in 0..200 {
            let d = scheduler.next_delay(&mut rng).as_secs_f64();
            assert!(
                d >= 0.7 * gap + 2.0 - 1e-6 && d <= 1.3 * gap + 8.0 + 1e-6,
                "delay {d} out of bounds"
            );
        }
    }

    #[tokio::test]
    async fn test_long_break() {
        let (scheduler, _, _) = scheduler_at(at(2024, 5, 1, 9, 0), 10);
        assert_eq!(
            scheduler.maybe_long_break(&mut FixedRandom::new(0.0)),
            Some(Duration::from_secs(60))
        );
        assert_eq!(scheduler.maybe_long_break(&mut FixedRandom::always_proceed()), None);
    }

    #[test]
    fn test_waking_hours_window() {
        let waking = WakingHours::from(&PacingConfig::default());
        let utc = Utc.fix();
        assert!(waking.contains(at(2024, 5, 1, 8, 0).with_timezone(&utc)));
        assert!(waking.contains(at(2024, 5, 1, 22, 59).with_timezone(&utc)));
        assert!(!waking.contains(at(2024, 5, 1, 23, 0).with_timezone(&utc)));
        assert!(!waking.contains(at(2024, 5, 1, 7, 59).with_timezone(&utc)));
    }

    #[test]
    fn test_resume_at() {
        let waking = WakingHours::from(&PacingConfig::default());
        let utc = Utc.fix();
        assert_eq!(
            waking.resume_at(at(2024, 5, 1, 3, 0).with_timezone(&utc)),
            Some(at(2024, 5, 1, 8, 0))
        );
        assert_eq!(
            waking.resume_at(at(2024, 5, 1, 23, 30).with_timezone(&utc)),
            Some(at(2024, 5, 2, 8, 0))
        );
    }

    #[test]
    fn test_resume_at_respects_offset() {
        let waking = WakingHours::from(&PacingConfig::default());
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        // 01:00 UTC is 03:00 local; resume at 08:00 local = 06:00 UTC.
        assert_eq!(
            waking.resume_at(at(2024, 5, 1, 1, 0).with_timezone(&plus_two)),
            Some(at(2024, 5, 1, 6, 0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_waking_hours_suspends_until_morning() {
        let (scheduler, clock, _) = scheduler_at(at(2024, 5, 1, 3, 0), 10);
        assert_eq!(scheduler.await_waking_hours().await, WaitOutcome::Ready);
        assert_eq!(clock.now(), at(2024, 5, 1, 8, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_waking_hours_inside_window_returns_at_once() {
        let (scheduler, clock, _) = scheduler_at(at(2024, 5, 1, 12, 0), 10);
        assert_eq!(scheduler.await_waking_hours().await, WaitOutcome::Ready);
        assert_eq!(clock.now(), at(2024, 5, 1, 12, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_overnight_wait() {
        let (scheduler, clock, cancel) = scheduler_at(at(2024, 5, 1, 23, 10), 10);
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            cancel.cancel();
        };
        let (outcome, _) = tokio::join!(scheduler.await_waking_hours(), canceller);
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(clock.now() <= at(2024, 5, 2, 0, 10) + TimeDelta::minutes(15));
    }

    #[test]
    fn test_checkpoint_is_capped_at_fifteen_minutes() {
        let pacing = PacingConfig {
            max_wait_checkpoint_secs: 7200,
            ..PacingConfig::default()
        };
        let scheduler = PacingScheduler::new(
            10,
            ProbabilityPolicy::default(),
            &pacing,
            Arc::new(SimulatedClock::utc(at(2024, 5, 1, 9, 0))),
            CancelSignal::new(),
        );
        assert_eq!(scheduler.checkpoint(), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_wait() {
        let (scheduler, _, cancel) = scheduler_at(at(2024, 5, 1, 9, 0), 10);
        cancel.cancel();
        assert_eq!(scheduler.sleep_until(at(2024, 5, 1, 10, 0)).await, WaitOutcome::Cancelled);
        assert!(scheduler
            .advance_and_wait(at(2024, 5, 1, 9, 0), &mut FixedRandom::always_proceed())
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_and_wait_threads_timestamp() {
        let start = at(2024, 5, 1, 9, 0);
        let (scheduler, clock, _) = scheduler_at(start, 3);
        // 0.7 * 21600 + 2 + 60 second long break.
        let next = scheduler
            .advance_and_wait(start, &mut FixedRandom::new(0.0))
            .await
            .unwrap();
        let expected = start + TimeDelta::seconds(15_182);
        assert!((next - expected).abs() < TimeDelta::milliseconds(5), "next {next}");
        assert!(clock.now() >= next);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_and_wait_skips_the_night() {
        let start = at(2024, 5, 1, 22, 0);
        let (scheduler, clock, _) = scheduler_at(start, 3);
        let next = scheduler
            .advance_and_wait(start, &mut FixedRandom::new(0.0))
            .await
            .unwrap();
        assert!(next >= at(2024, 5, 2, 8, 0));
        assert!(next < at(2024, 5, 2, 8, 0) + TimeDelta::seconds(1));
        assert!(scheduler.waking_hours().contains(clock.local_now()));
    }
}
