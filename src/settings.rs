use config::{Config, ConfigError, File};
use serde::Deserialize;

use std::path::Path;

fn default_quorum() -> u32 {
    3
}
fn default_headers_per_second() -> u32 {
    100
}
fn default_blocks_per_minute() -> u32 {
    60
}
fn default_connect_timeout_seconds() -> u64 {
    5
}
fn default_keep_alive_seconds() -> u64 {
    30
}
fn default_anchor() -> String {
    // The genesis anchor; overridden per network.
    format!("0:{}", "00".repeat(32))
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The address advertised to peers in the version handshake.
    pub listener_ip: String,
    /// Seed addresses of sync peers.
    pub sync_peers: Vec<String>,
    /// Hard-coded checkpoints in the format `HEIGHT:HASH`.
    #[serde(default)]
    pub checkpoints: Vec<String>,
    /// The resume anchor in the format `HEIGHT:HASH`.
    #[serde(default = "default_anchor")]
    pub anchor: String,
    /// Successful peer syncs required before a phase completes.
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    #[serde(default = "default_headers_per_second")]
    pub headers_per_second: u32,
    #[serde(default = "default_blocks_per_minute")]
    pub blocks_per_minute: u32,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
}

const CONFIG_FILE: &str = "Default.json";

impl Settings {
    pub fn new(home: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(home.join(CONFIG_FILE)))
            .build()?
            .try_deserialize()
    }
}
