//! Sample pacing on embassy-time.
//!
//! [`PacedDelay`] implements [`DelayNs`] against an absolute deadline. Each
//! requested hold advances the deadline by exactly that hold, so the time
//! spent scaling a sample and writing the DAC between two holds is absorbed
//! instead of being added on top. A plain `Timer::after` per sample would
//! stretch every period by the write overhead and lower the pitch.
//!
//! Holds are summed in nanoseconds since one anchor instant and converted to
//! ticks once per deadline. Converting each hold separately would round every
//! sample up to a whole tick: at 32 768 Hz a 63 µs hold becomes 3 ticks
//! (91.6 µs) and a 16 kHz clip plays near 11 kHz.

use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::delay::DelayNs;

/// Deadline-based [`DelayNs`] for fixed-rate sample output.
#[derive(Debug, Default)]
pub struct PacedDelay {
    anchor: Option<Instant>,
    /// Nanoseconds of holds scheduled since `anchor`.
    scheduled_ns: u64,
}

impl PacedDelay {
    /// Create a pacer with no deadline; the first hold starts from now.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            anchor: None,
            scheduled_ns: 0,
        }
    }

    /// Forget the current deadline so the next hold starts from now.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.scheduled_ns = 0;
    }

    /// Deadline for a hold of `ns` requested at `now`.
    ///
    /// Re-anchors to `now` when the pacer is more than one hold behind
    /// (first sample, or a new clip after an idle gap).
    fn next_deadline(&mut self, now: Instant, ns: u32) -> Instant {
        let hold = u64::from(ns);
        if let Some(anchor) = self.anchor {
            let target = self.scheduled_ns.saturating_add(hold);
            // Previous deadline plus one hold.
            let on_time = anchor
                .checked_add(Duration::from_nanos(target))
                .filter(|deadline| *deadline >= now);
            if let Some(deadline) = on_time {
                self.scheduled_ns = target;
                return deadline;
            }
        }
        self.anchor = Some(now);
        self.scheduled_ns = hold;
        now.checked_add(Duration::from_nanos(hold))
            .unwrap_or(Instant::MAX)
    }
}

impl DelayNs for PacedDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let deadline = self.next_deadline(Instant::now(), ns);
        Timer::at(deadline).await;
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    /// Drive the pacer as a sample loop that wakes exactly on each deadline.
    fn run_on_time(delay: &mut PacedDelay, start: Instant, holds: u32, ns: u32) -> Instant {
        let mut now = start;
        for _ in 0..holds {
            now = delay.next_deadline(now, ns);
        }
        now
    }

    #[test]
    fn rounding_does_not_accumulate_across_holds() {
        let mut delay = PacedDelay::new();
        let start = Instant::from_micros(1_000);
        // 62.5 us is not a whole tick; rounding each hold up would give 63 ms.
        let end = run_on_time(&mut delay, start, 1_000, 62_500);
        let elapsed = end.checked_duration_since(start).unwrap();
        assert!(elapsed >= Duration::from_micros(62_500));
        assert!(elapsed <= Duration::from_micros(62_501));
    }

    #[test]
    fn sixteen_khz_second_lasts_one_second() {
        let mut delay = PacedDelay::new();
        let start = Instant::from_micros(0);
        // 16 000 holds of 1e9 / 16 000 ns.
        let end = run_on_time(&mut delay, start, 16_000, 62_500);
        let elapsed = end.checked_duration_since(start).unwrap();
        assert!(elapsed <= Duration::from_micros(1_000_001));
        assert!(elapsed >= Duration::from_secs(1));
    }

    #[test]
    fn slightly_late_wakeup_keeps_the_schedule() {
        let mut delay = PacedDelay::new();
        let start = Instant::from_micros(0);
        let first = delay.next_deadline(start, 100_000);
        // Woke 30 us late: the next deadline still counts from the anchor.
        let second = delay.next_deadline(first + Duration::from_micros(30), 100_000);
        assert_eq!(second, start + Duration::from_micros(200));
    }

    #[test]
    fn stale_anchor_is_replaced() {
        let mut delay = PacedDelay::new();
        let start = Instant::from_micros(0);
        delay.next_deadline(start, 100_000);
        let idle = start + Duration::from_millis(20);
        assert_eq!(
            delay.next_deadline(idle, 100_000),
            idle + Duration::from_micros(100)
        );
    }

    #[tokio::test]
    async fn total_elapsed_covers_every_hold() {
        let mut delay = PacedDelay::new();
        let start = std::time::Instant::now();
        for _ in 0..20 {
            delay.delay_us(500).await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(10));
        assert!(elapsed < std::time::Duration::from_millis(250));
    }

    #[tokio::test]
    async fn stale_deadline_is_reanchored() {
        let mut delay = PacedDelay::new();
        delay.delay_us(100).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // A stale deadline would return immediately; a fresh one waits.
        let start = std::time::Instant::now();
        delay.delay_ms(5).await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(5));
    }

    #[tokio::test]
    async fn reset_clears_deadline() {
        let mut delay = PacedDelay::new();
        delay.delay_us(10).await;
        delay.reset();
        assert!(delay.anchor.is_none());
        assert_eq!(delay.scheduled_ns, 0);
    }
}
