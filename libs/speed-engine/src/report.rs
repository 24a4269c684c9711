use std::future::Future;
use std::io::Write;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use speed_api::AccessMode;

use crate::rate::{RateCounters, RateSnapshot};

/// One report line: reads only, or reads/writes/removes.
pub fn format_line(mode: AccessMode, rates: &RateSnapshot) -> String {
    match mode {
        AccessMode::ReadOnly => format!("{:6.1} reads/sec", rates.reads),
        AccessMode::ReadWrite => format!(
            "{:6.1} reads/sec  {:6.1} writes/sec  {:6.1} removes/sec",
            rates.reads, rates.writes, rates.removes
        ),
    }
}

/// Polls the counters every `poll` and prints a line once `every` has
/// passed since the previous one.
pub struct Reporter {
    pub mode: AccessMode,
    pub poll: Duration,
    pub every: Duration,
}

impl Reporter {
    /// Runs until `stop` resolves. Returns the number of lines written.
    pub async fn run_until<W, F>(&self, counters: &RateCounters, out: &mut W, stop: F) -> std::io::Result<u64>
    where
        W: Write + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll, self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        let mut lines = 0u64;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                now = ticker.tick() => {
                    if now.saturating_duration_since(last) >= self.every {
                        writeln!(out, "{}", format_line(self.mode, &counters.snapshot()))?;
                        out.flush()?;
                        lines += 1;
                        last = now;
                    }
                }
            }
        }

        Ok(lines)
    }
}
