use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Deserialize;

use speed_api::{AccessMode, Destination};
use speed_engine::BenchSettings;

use super::error::SpeedError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// MongoDB server at the destination
    Mongodb,
    /// In-process collection, nothing leaves the process
    Memory,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub store: Option<StoreKind>,
    pub app_name: Option<String>,
    pub seed_count: Option<usize>,
    pub batch_size: Option<usize>,
    pub window_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub report_every_ms: Option<u64>,
}

pub fn load_config(path: &str) -> Result<Config, SpeedError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SpeedError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| SpeedError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct SpeedArgs {
    /// Target collection
    #[arg(value_name = "host[:port]/db/collection")]
    pub destination: Destination,

    /// Only query existing data, don't write/remove any
    #[arg(long)]
    pub readonly: bool,

    /// Path to config.toml
    #[arg(long, default_value = "mongo-speed.toml", env = "MONGO_SPEED_CONFIG")]
    pub config: String,

    /// Storage backend
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Application name reported to the server
    #[arg(long)]
    pub app_name: Option<String>,

    /// Records inserted before the workers start
    #[arg(long)]
    pub seed_count: Option<usize>,

    /// Operations per batch between shutdown checks
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Minimum rate window, ms
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Reporter polling period, ms
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Minimum gap between report lines, ms
    #[arg(long)]
    pub report_every_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Final configuration after the merge: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub destination: Destination,
    pub mode: AccessMode,
    pub store: StoreKind,
    pub app_name: String,
    pub settings: BenchSettings,
}

impl Effective {
    pub fn new(args: &SpeedArgs) -> Result<Self, SpeedError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &SpeedArgs, cfg: Config) -> Result<Self, SpeedError> {
        let defaults = BenchSettings::default();

        let batch_size = args.batch_size.or(cfg.batch_size).unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            return Err(SpeedError::Config("batch_size must be > 0".into()));
        }
        let poll_ms = args.poll_ms.or(cfg.poll_ms);
        if poll_ms == Some(0) {
            return Err(SpeedError::Config("poll_ms must be > 0".into()));
        }

        let ms = |v: Option<u64>, default: Duration| v.map(Duration::from_millis).unwrap_or(default);

        Ok(Self {
            destination: args.destination.clone(),
            mode: AccessMode::from_readonly(args.readonly),
            store: args.store.or(cfg.store).unwrap_or(StoreKind::Mongodb),
            app_name: args.app_name.clone().or(cfg.app_name).unwrap_or_else(|| "mongo-speed".into()),
            settings: BenchSettings {
                seed_count: args.seed_count.or(cfg.seed_count).unwrap_or(defaults.seed_count),
                batch_size,
                window: ms(args.window_ms.or(cfg.window_ms), defaults.window),
                poll: ms(poll_ms, defaults.poll),
                report_every: ms(args.report_every_ms.or(cfg.report_every_ms), defaults.report_every),
            },
        })
    }
}
