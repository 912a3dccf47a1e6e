//! Application configuration
//!
//! A single JSON file holds credentials, environment, scheduling times, and
//! the dry-run flag. The schedule section compiles into the scheduler's
//! trigger entries.

use crate::brokers::types::ApiEnv;
use crate::error::{AppError, Result};
use crate::rotation::RotationAction;
use crate::scheduler::ScheduleEntry;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Rotation schedule: three trigger times bound to the two canned actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// First GTC→EXTENDED trigger, `HH:MM:SS`.
    #[serde(default = "default_gtc_to_extended_1")]
    pub gtc_to_extended_1: String,
    /// Second GTC→EXTENDED trigger.
    #[serde(default = "default_gtc_to_extended_2")]
    pub gtc_to_extended_2: String,
    /// EXTENDED→GTC trigger.
    #[serde(default = "default_extended_to_gtc")]
    pub extended_to_gtc: String,
    /// IANA timezone name every trigger is evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_gtc_to_extended_1() -> String {
    "06:30:00".to_string()
}
fn default_gtc_to_extended_2() -> String {
    "08:00:00".to_string()
}
fn default_extended_to_gtc() -> String {
    "13:00:00".to_string()
}
fn default_timezone() -> String {
    "America/Phoenix".to_string()
}
fn default_dry_run() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            gtc_to_extended_1: default_gtc_to_extended_1(),
            gtc_to_extended_2: default_gtc_to_extended_2(),
            extended_to_gtc: default_extended_to_gtc(),
            timezone: default_timezone(),
        }
    }
}

impl ScheduleConfig {
    /// Scheduler timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| AppError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Compile the configured times into scheduler entries.
    pub fn entries(&self) -> Result<Vec<ScheduleEntry>> {
        let parse = |raw: &str| -> Result<NaiveTime> {
            NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
                .map_err(|_| AppError::Config(format!("invalid trigger time '{}'", raw)))
        };
        Ok(vec![
            ScheduleEntry {
                trigger: parse(&self.gtc_to_extended_1)?,
                action: RotationAction::gtc_to_extended(),
            },
            ScheduleEntry {
                trigger: parse(&self.gtc_to_extended_2)?,
                action: RotationAction::gtc_to_extended(),
            },
            ScheduleEntry {
                trigger: parse(&self.extended_to_gtc)?,
                action: RotationAction::extended_to_gtc(),
            },
        ])
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub env: ApiEnv,
    /// Account the scheduled rotations act on.
    #[serde(default)]
    pub account_id_key: Option<String>,
    /// When set, change payloads are logged and never sent to the write
    /// endpoints.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            env: ApiEnv::default(),
            account_id_key: None,
            dry_run: default_dry_run(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Persist configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }
}
