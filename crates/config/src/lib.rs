use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Process-wide daemon configuration: scheduling, path overrides, telemetry.
///
/// Per-vault pipeline and secrets configuration (`.memory-loop/sync/*.yaml`,
/// `.memory-loop/secrets/*.yaml`) is deliberately *not* part of this struct —
/// it is discovered per-vault by the sync engine at run time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub paths: PathsConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 6-field cron expression (sec min hour dom month dow) governing the
    /// extraction engine's daily trigger.
    pub extraction_schedule: String,
    /// Hours since last run before a catch-up run is triggered on startup.
    pub extraction_catchup_hours: u32,
    /// Hour-of-day (0-23, local time) at which card discovery's daily pass runs.
    pub card_discovery_hour: u8,
    /// Per-ISO-week byte budget for the card discovery weekly catch-up pass.
    pub card_discovery_weekly_budget_bytes: u64,
    /// Hours since last sync before a pipeline's files are considered "recent"
    /// and skipped during an incremental run.
    pub sync_incremental_threshold_hours: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            extraction_schedule: "0 0 3 * * *".to_string(),
            extraction_catchup_hours: 24,
            card_discovery_hour: 3,
            card_discovery_weekly_budget_bytes: 500 * 1024,
            sync_incremental_threshold_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Parent directory under which vaults are discovered.
    pub vaults_root: String,
    /// Absolute path to the global memory file.
    pub memory_file: String,
    /// Directory holding the extraction sandbox staging file.
    pub sandbox_dir: String,
    /// Directory holding ledger/state JSON documents.
    pub state_dir: String,
    /// Unix domain socket path for the daemon's client protocol.
    pub socket_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            vaults_root: format!("{home}/vaults"),
            memory_file: format!("{home}/.claude/rules/memory.md"),
            sandbox_dir: format!("{home}/.memory-loop/sandbox"),
            state_dir: format!("{home}/.memory-loop/state"),
            socket_path: "/tmp/memory-loop.sock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path.as_ref()) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("MEMORY_LOOP_MEMORY_PATH") {
            if !value.is_empty() {
                config.paths.memory_file = value;
            }
        }
        if let Ok(value) = env::var("MEMORY_LOOP_VAULTS_ROOT") {
            if !value.is_empty() {
                config.paths.vaults_root = value;
            }
        }
        if let Ok(value) = env::var("EXTRACTION_SCHEDULE") {
            if !value.is_empty() {
                config.scheduler.extraction_schedule = value;
            }
        }
        if let Ok(value) = env::var("EXTRACTION_CATCHUP_HOURS") {
            if let Ok(hours) = value.parse() {
                config.scheduler.extraction_catchup_hours = hours;
            }
        }
        if let Ok(value) = env::var("CARD_DISCOVERY_HOUR") {
            if let Ok(hour) = value.parse() {
                config.scheduler.card_discovery_hour = hour;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn extraction_state_path(&self) -> PathBuf {
        Path::new(&self.paths.state_dir).join("extraction-state.json")
    }

    pub fn card_discovery_state_path(&self) -> PathBuf {
        Path::new(&self.paths.state_dir).join("card-discovery-state.json")
    }
}
