//! Daemon configuration
//!
//! Loaded from `~/.alarmsweet/config.toml` (or the file named by
//! `ALARMSWEET_CONFIG`). Every field is optional; a missing file means
//! all defaults.
//!
//! Credential resolution order:
//! 1. `[remote] username` / `password` in the config file
//! 2. `ALARMSWEET_USERNAME` / `ALARMSWEET_PASSWORD` environment variables

use std::path::{Path, PathBuf};

use alarmsweet_core::{DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT, SNOOZE_TIME_SECONDS};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 1;
const DEFAULT_SOUND_FILE: &str = "sound.wav";
const DEFAULT_REMOTE_URL: &str = "http://localhost:3001";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Which ringer the evaluator drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RingerKind {
    /// Terminal bell on stderr
    #[default]
    Bell,
    /// Looping WAV playback (needs the `audio` feature)
    Sound,
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Snooze length in seconds (default: 10)
    #[serde(default = "default_snooze_seconds")]
    pub snooze_seconds: i64,
    /// Evaluation tick in milliseconds (default: 10)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Remote poll interval in seconds (default: 1)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub ringer: RingerKind,
    #[serde(default = "default_sound_file")]
    pub sound_file: PathBuf,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Remote alarm source settings
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL; `/alarms` and `/health` are appended
    #[serde(default = "default_remote_url")]
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Ask only for alarms within this many days from now
    pub window_days: Option<u32>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            snooze_seconds: default_snooze_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            sync_interval_secs: default_sync_interval_secs(),
            ringer: RingerKind::default(),
            sound_file: default_sound_file(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_remote_url(),
            username: None,
            password: None,
            window_days: None,
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_bind_port() -> u16 {
    DEFAULT_BIND_PORT
}

fn default_snooze_seconds() -> i64 {
    SNOOZE_TIME_SECONDS
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_sound_file() -> PathBuf {
    PathBuf::from(DEFAULT_SOUND_FILE)
}

fn default_enabled() -> bool {
    true
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

impl DaemonConfig {
    /// Directory holding the daemon's config file.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".alarmsweet"))
            .unwrap_or_else(|| PathBuf::from("/tmp/.alarmsweet"))
    }

    /// Path of the config file, honoring `ALARMSWEET_CONFIG`.
    pub fn config_path() -> PathBuf {
        std::env::var_os("ALARMSWEET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::home_dir().join("config.toml"))
    }

    /// Load the configuration from the default location.
    ///
    /// # Errors
    /// Returns `anyhow::Error` if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.remote.resolve_credentials();
        Ok(config)
    }

    /// Load the configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.snooze_seconds <= 0 {
            bail!("snooze_seconds must be positive, got {}", self.snooze_seconds);
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        if self.sync_interval_secs == 0 {
            bail!("sync_interval_secs must be positive");
        }
        Ok(())
    }

    /// `host:port` the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

impl RemoteConfig {
    /// Fill missing credentials from the environment.
    pub fn resolve_credentials(&mut self) {
        if self.username.is_none() {
            self.username = std::env::var("ALARMSWEET_USERNAME").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("ALARMSWEET_PASSWORD").ok();
        }
    }
}
