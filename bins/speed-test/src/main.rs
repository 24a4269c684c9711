mod meter;

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tokio::time::{Instant, MissedTickBehavior};

use meter::TickMeter;

#[derive(Parser)]
#[command(
    name = "speed-test",
    version,
    about = "Tick at a fixed frequency and print how many of the expected ticks arrived"
)]
struct Cli {
    /// Length of one tick.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// How often a line is printed.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    period_ms: u64,
}

/// Counts ticks until `stop` resolves, one line per period. Ticks the
/// process misses are skipped, not replayed, so they show up as a
/// percentage below 100. Returns the number of lines written.
async fn run<W, F>(tick: Duration, period: Duration, out: &mut W, stop: F) -> std::io::Result<u64>
where
    W: Write + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);

    let start = Instant::now();
    let mut ticker = tokio::time::interval_at(start + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut meter = TickMeter::new(tick, period, start);
    let mut lines = 0u64;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            now = ticker.tick() => {
                if let Some(sample) = meter.tick(now) {
                    writeln!(out, "{sample}")?;
                    out.flush()?;
                    lines += 1;
                }
            }
        }
    }

    Ok(lines)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(tick_ms = cli.tick_ms, period_ms = cli.period_ms, "counting ticks");

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C, stopping");
        }
    };

    let mut out = std::io::stdout();
    match run(Duration::from_millis(cli.tick_ms), Duration::from_millis(cli.period_ms), &mut out, stop).await {
        Ok(lines) => tracing::info!(lines, "stopped"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_one_khz_per_second() {
        let cli = Cli::try_parse_from(["speed-test"]).unwrap();
        assert_eq!(cli.tick_ms, 1);
        assert_eq!(cli.period_ms, 1000);
    }

    #[test]
    fn zero_lengths_rejected() {
        assert!(Cli::try_parse_from(["speed-test", "--tick-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["speed-test", "--period-ms", "0"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn undisturbed_timer_runs_at_full_speed() {
        let mut out = Vec::new();
        let lines = run(
            Duration::from_millis(1),
            Duration::from_secs(1),
            &mut out,
            tokio::time::sleep(Duration::from_millis(3500)),
        )
        .await
        .unwrap();

        assert_eq!(lines, 3);
        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            assert!(line.starts_with("100.00%,  1.00 sec, 1000 incr"), "{line}");
        }
    }
}
