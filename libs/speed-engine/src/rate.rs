use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

// ═══════════════════════════════════════════════════════════════
//  Operation kind
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
    Remove,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Remove => "remove",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
//  RateCounter — single writer, many readers
// ═══════════════════════════════════════════════════════════════

/// Latest published rate (ops/sec), stored as `f64` bits.
///
/// Overwritten once per window by its worker; the reporter only loads.
/// Relaxed ordering: a stale value for one report line is fine.
#[derive(Debug, Default)]
pub struct RateCounter(AtomicU64);

impl RateCounter {
    /// Non-finite and negative rates are published as `0.0`.
    pub fn publish(&self, rate: f64) {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
        self.0.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub struct RateCounters {
    pub reads: RateCounter,
    pub writes: RateCounter,
    pub removes: RateCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateSnapshot {
    pub reads: f64,
    pub writes: f64,
    pub removes: f64,
}

impl RateCounters {
    pub fn for_op(&self, op: OpKind) -> &RateCounter {
        match op {
            OpKind::Read => &self.reads,
            OpKind::Write => &self.writes,
            OpKind::Remove => &self.removes,
        }
    }

    pub fn snapshot(&self) -> RateSnapshot {
        RateSnapshot {
            reads: self.reads.get(),
            writes: self.writes.get(),
            removes: self.removes.get(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  RateWindow — count ops, emit a rate once the threshold elapses
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct RateWindow {
    threshold: Duration,
    started: Instant,
    count: u64,
}

impl RateWindow {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self { threshold, started: now, count: 0 }
    }

    pub fn add(&mut self, ops: u64) {
        self.count = self.count.saturating_add(ops);
    }

    /// Returns the window's rate and starts a fresh window when at least
    /// `threshold` has passed since the current one started.
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.threshold || elapsed.is_zero() {
            return None;
        }
        let rate = self.count as f64 / elapsed.as_secs_f64();
        self.count = 0;
        self.started = now;
        Some(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_waits_for_threshold() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(Duration::from_millis(1800), t0);
        w.add(10);
        assert_eq!(w.poll(t0 + Duration::from_millis(1799)), None);

        w.add(8);
        let rate = w.poll(t0 + Duration::from_millis(2000)).unwrap();
        assert!((rate - 9.0).abs() < 1e-9);
    }

    #[test]
    fn window_resets_after_emitting() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(Duration::from_secs(1), t0);
        w.add(100);
        assert!(w.poll(t0 + Duration::from_secs(2)).is_some());

        // new window starts at t0+2s with an empty count
        assert_eq!(w.poll(t0 + Duration::from_millis(2500)), None);
        w.add(5);
        let rate = w.poll(t0 + Duration::from_secs(3)).unwrap();
        assert!((rate - 5.0).abs() < 1e-9);
    }

    #[test]
    fn idle_window_reports_zero() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(Duration::from_secs(1), t0);
        assert_eq!(w.poll(t0 + Duration::from_secs(1)), Some(0.0));
    }

    #[test]
    fn zero_threshold_needs_elapsed_time() {
        let t0 = Instant::now();
        let mut w = RateWindow::new(Duration::ZERO, t0);
        w.add(1);
        assert_eq!(w.poll(t0), None);
        assert!(w.poll(t0 + Duration::from_millis(1)).is_some());
    }

    #[test]
    fn counter_never_negative() {
        let c = RateCounter::default();
        assert_eq!(c.get(), 0.0);
        c.publish(12.5);
        assert_eq!(c.get(), 12.5);
        c.publish(-3.0);
        assert_eq!(c.get(), 0.0);
        c.publish(f64::NAN);
        assert_eq!(c.get(), 0.0);
        c.publish(f64::INFINITY);
        assert_eq!(c.get(), 0.0);
    }

    #[test]
    fn counters_route_by_op() {
        let counters = RateCounters::default();
        counters.for_op(OpKind::Write).publish(4.0);
        counters.for_op(OpKind::Remove).publish(2.0);
        assert_eq!(
            counters.snapshot(),
            RateSnapshot { reads: 0.0, writes: 4.0, removes: 2.0 }
        );
    }
}
