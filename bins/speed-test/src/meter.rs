use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Ticks seen over one period against what the tick length promises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub percent: f64,
    pub elapsed_secs: f64,
    pub ticks: u64,
    pub expected: f64,
}

impl fmt::Display for SpeedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:6.2}%, {:5.2} sec, {:4} incr, {:6.1} expected incr",
            self.percent, self.elapsed_secs, self.ticks, self.expected
        )
    }
}

/// Counts timer ticks. Once a period has passed, compares the count with
/// the number of ticks that should have fired and starts over.
#[derive(Debug)]
pub struct TickMeter {
    tick: Duration,
    period: Duration,
    count: u64,
    started: Instant,
}

impl TickMeter {
    pub fn new(tick: Duration, period: Duration, now: Instant) -> Self {
        Self { tick, period, count: 0, started: now }
    }

    pub fn tick(&mut self, now: Instant) -> Option<SpeedSample> {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.period || self.tick.is_zero() {
            return None;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let expected = elapsed_secs / self.tick.as_secs_f64();
        let sample = SpeedSample {
            percent: 100.0 * self.count as f64 / expected,
            elapsed_secs,
            ticks: self.count,
            expected,
        };
        self.count = 0;
        self.started = now;
        Some(sample)
    }
}
