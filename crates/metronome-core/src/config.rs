use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Cadence of the scheduler loop's tick.
pub const TICK_INTERVAL_SECS: u64 = 60;
/// How far ahead of "now" discovery looks for due jobs.
pub const LOOKAHEAD_MINUTES: i64 = 3;
/// Buffered capacity of the status-update channel between dispatched tasks
/// and the scheduler loop.
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Top-level config (metronome.toml + METRONOME_* env overrides).
///
/// Which discovery backend runs is decided by precedence over the optional
/// sections: job_file > database > api > rpc, falling back to the mock.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetronomeConfig {
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The single process-scope zone switch: true means every "now" and
/// truncation uses UTC, false means the system's local zone.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeConfig {
    #[serde(default)]
    pub use_utc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscoveryConfig {
    /// Full path to a JSON job file on the local system.
    pub job_file: Option<String>,
    pub database: Option<DatabaseConfig>,
    pub api: Option<ApiDiscoveryConfig>,
    pub rpc: Option<RpcDiscoveryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite schedule store.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDiscoveryConfig {
    /// Endpoint returning due jobs; the window end is appended as a unix
    /// timestamp path segment.
    pub get_url: String,
    /// Endpoint receiving the advanced job on completion.
    pub complete_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDiscoveryConfig {
    /// host:port of the job service speaking newline-delimited JSON frames.
    pub url: String,
}

/// Runner selection; rpc wins over api when both are set, mock otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerConfig {
    #[serde(default)]
    pub use_api: bool,
    #[serde(default)]
    pub use_rpc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// When set, diagnostic lines append to this file instead of stdout.
    pub file: Option<String>,
}

impl MetronomeConfig {
    /// Load config from a TOML file with METRONOME_* env var overrides.
    ///
    /// Checks the explicit path argument first, then ./metronome.toml.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("metronome.toml");

        let config: MetronomeConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("METRONOME_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}
