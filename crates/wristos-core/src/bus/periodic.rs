use embassy_time::{Duration, Instant};
use log::debug;

/// Timer state for a channel that publishes on a fixed cadence.
///
/// The driver does not own a hardware timer. The event loop hands it the
/// current instant on every iteration and it answers whether a publication
/// is due. When the loop stalls for several periods the driver fires once
/// and skips the missed deadlines instead of bursting.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicDriver {
    period: Duration,
    next_due: Instant,
    fired: u32,
    missed: u32,
}

impl PeriodicDriver {
    /// Create a driver whose first deadline is one period after `start`.
    ///
    /// Returns `None` for a zero period.
    pub fn new(period: Duration, start: Instant) -> Option<Self> {
        if period.as_ticks() == 0 {
            return None;
        }

        Some(Self {
            period,
            next_due: start + period,
            fired: 0,
            missed: 0,
        })
    }

    /// Returns `true` when a publication is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }

        let late = now - self.next_due;
        let skipped = late.as_ticks() / self.period.as_ticks();
        if skipped > 0 {
            debug!(
                "Periodic driver ({} ms) skipped {} deadlines",
                self.period.as_millis(),
                skipped
            );
            self.missed = self.missed.saturating_add(skipped as u32);
        }

        self.next_due = self.next_due + self.period * (skipped as u32 + 1);
        self.fired = self.fired.wrapping_add(1);
        true
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Number of times the driver fired
    pub fn fired(&self) -> u32 {
        self.fired
    }

    /// Number of deadlines dropped because the loop ran late
    pub fn missed(&self) -> u32 {
        self.missed
    }
}
