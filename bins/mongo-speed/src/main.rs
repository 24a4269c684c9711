mod cmd;

use clap::Parser;
use cmd::config::{Effective, SpeedArgs};

#[derive(Parser)]
#[command(
    name = "mongo-speed",
    version,
    about = "Track relative read/write/remove throughput against a MongoDB collection"
)]
struct Cli {
    #[command(flatten)]
    args: SpeedArgs,
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

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cmd::bench::run(eff).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
