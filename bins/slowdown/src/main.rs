mod throttle;

use std::time::Duration;

use clap::Parser;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::time::MissedTickBehavior;

use throttle::Throttle;

#[derive(Parser)]
#[command(
    name = "slowdown",
    version,
    about = "Slow a process down by stopping and resuming it at random"
)]
struct Cli {
    /// Process to slow down.
    #[arg(value_parser = parse_pid)]
    pid: Pid,

    /// Chance, in percent, that the process is stopped during one tick.
    #[arg(value_parser = parse_percent, default_value = "50")]
    pause_percent: u8,

    /// Length of one tick.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
}

fn parse_pid(s: &str) -> Result<Pid, String> {
    let raw: i32 = s
        .parse()
        .map_err(|_| "Unable to parse PID argument as int.".to_string())?;
    // 0 and negative values address process groups
    if raw <= 0 {
        return Err("PID must be a positive process id.".into());
    }
    Ok(Pid::from_raw(raw))
}

fn parse_percent(s: &str) -> Result<u8, String> {
    let perc: i64 = s
        .parse()
        .map_err(|_| "Unable to parse pause percent argument as int.".to_string())?;
    match u8::try_from(perc) {
        Ok(p) if p <= 100 => Ok(p),
        _ => Err("Pause percent should be between 0 and 100.".into()),
    }
}

#[derive(Debug, thiserror::Error)]
enum SlowdownError {
    #[error("cannot signal process {pid}: {source}")]
    Target { pid: Pid, source: Errno },
    #[error("process {pid} is gone")]
    Gone { pid: Pid },
    #[error("failed to resume process {pid} before exiting: {source}")]
    Resume { pid: Pid, source: Errno },
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

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Throttles the target until Ctrl+C, then resumes it if it was left stopped.
async fn run(cli: Cli) -> Result<(), SlowdownError> {
    let pid = cli.pid;
    // no signal: only checks the process exists and may be signalled
    kill(pid, None).map_err(|source| SlowdownError::Target { pid, source })?;
    tracing::info!(%pid, pause_percent = cli.pause_percent, tick_ms = cli.tick_ms, "slowing down");

    let mut throttle = Throttle::new(cli.pause_percent);
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            res = &mut stop => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "cannot listen for Ctrl+C, stopping");
                }
                break;
            }
            _ = ticker.tick() => {
                match throttle.tick(rand::random::<f64>(), |signal| kill(pid, signal)) {
                    Ok(Some(signal)) => tracing::trace!(%pid, ?signal, "signalled"),
                    Ok(None) => {}
                    Err(Errno::ESRCH) => return Err(SlowdownError::Gone { pid }),
                    Err(e) => tracing::warn!(%pid, error = %e, "signal not delivered"),
                }
            }
        }
    }

    println!();
    throttle
        .release(|signal| kill(pid, signal))
        .map_err(|source| SlowdownError::Resume { pid, source })?;
    tracing::info!(%pid, "target resumed, exiting");
    Ok(())
}
