//! # Configuration Management Module
//!
//! TOML configuration for the game server, loaded once at startup.
//!
//! ## Configuration Structure
//!
//! - [`LoggingConfig`] - log level and optional log file
//! - [`StorageConfig`] - data directory (the farm database lives in `<data_dir>/farms`)
//! - [`FarmConfig`] - growth loop cadence and default crop timings
//! - [`DigConfig`] - dig site grid and odds
//! - [`EventsConfig`] - event bus diagnostics
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reelbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Scan every {}s", config.farm.scan_interval_secs);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [logging]
//! level = "info"
//! file = "reelbot.log"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [farm]
//! scan_interval_secs = 300
//! retry_delay_secs = 60
//! grow_minutes = 30
//! ready_minutes = 120
//!
//! [dig]
//! grid_width = 5
//! grid_height = 5
//! max_attempts = 5
//! max_finds = 3
//! success_odds = 0.5
//! idle_timeout_secs = 300
//! ```
//!
//! Every section except `[logging]` and `[storage]` may be omitted and falls back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::farm::{AdvancerConfig, GrowthRule};
use crate::games::DigRules;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub farm: FarmConfig,
    #[serde(default)]
    pub dig: DigConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl StorageConfig {
    pub fn farms_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("farms")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Seconds between growth scans
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Seconds to wait after a failed scan before retrying
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Minutes from planting until a crop is growing
    #[serde(default = "default_grow_minutes")]
    pub grow_minutes: u32,
    /// Minutes from planting until a crop is ready
    #[serde(default = "default_ready_minutes")]
    pub ready_minutes: u32,
}

fn default_scan_interval() -> u64 {
    300
}
fn default_retry_delay() -> u64 {
    60
}
fn default_grow_minutes() -> u32 {
    30
}
fn default_ready_minutes() -> u32 {
    120
}

impl Default for FarmConfig {
    fn default() -> Self {
        FarmConfig {
            scan_interval_secs: default_scan_interval(),
            retry_delay_secs: default_retry_delay(),
            grow_minutes: default_grow_minutes(),
            ready_minutes: default_ready_minutes(),
        }
    }
}

impl FarmConfig {
    pub fn advancer(&self) -> AdvancerConfig {
        AdvancerConfig {
            interval: Duration::from_secs(self.scan_interval_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn growth_rule(&self) -> GrowthRule {
        GrowthRule {
            grow_minutes: self.grow_minutes,
            ready_minutes: self.ready_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigConfig {
    #[serde(default = "default_grid")]
    pub grid_width: usize,
    #[serde(default = "default_grid")]
    pub grid_height: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_max_finds")]
    pub max_finds: u8,
    #[serde(default = "default_success_odds")]
    pub success_odds: f64,
    /// Sessions idle longer than this are swept by the server
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_grid() -> usize {
    5
}
fn default_max_attempts() -> u8 {
    5
}
fn default_max_finds() -> u8 {
    3
}
fn default_success_odds() -> f64 {
    0.5
}
fn default_idle_timeout() -> u64 {
    300
}

impl Default for DigConfig {
    fn default() -> Self {
        DigConfig {
            grid_width: default_grid(),
            grid_height: default_grid(),
            max_attempts: default_max_attempts(),
            max_finds: default_max_finds(),
            success_odds: default_success_odds(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl DigConfig {
    pub fn rules(&self) -> DigRules {
        DigRules {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            max_attempts: self.max_attempts,
            max_finds: self.max_finds,
            success_odds: self.success_odds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventsConfig {
    /// Debug-log publishes that reach no subscriber
    #[serde(default)]
    pub log_unhandled: bool,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.farm.scan_interval_secs == 0 || self.farm.retry_delay_secs == 0 {
            bail!("farm scan_interval_secs and retry_delay_secs must be > 0");
        }
        if self.farm.ready_minutes < self.farm.grow_minutes {
            bail!(
                "farm ready_minutes ({}) must be >= grow_minutes ({})",
                self.farm.ready_minutes,
                self.farm.grow_minutes
            );
        }
        if self.dig.grid_width == 0 || self.dig.grid_height == 0 {
            bail!("dig grid must be at least 1x1");
        }
        if !(0.0..=1.0).contains(&self.dig.success_odds) {
            bail!("dig success_odds must be within [0, 1], got {}", self.dig.success_odds);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("reelbot.log".to_string()),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            farm: FarmConfig::default(),
            dig: DigConfig::default(),
            events: EventsConfig::default(),
        }
    }
}
