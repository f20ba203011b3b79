//! The client wire protocol (§4.11, §9): newline-delimited JSON over a Unix
//! domain socket, mirroring the request/response shape the rest of this
//! workspace's daemon-facing crates use.

use serde::{Deserialize, Serialize};

use memloop_progress::ProgressEvent;
use memloop_sync::SyncMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Run the sync engine once, outside its normal schedule.
    TriggerSync { mode: SyncMode, pipeline: Option<String>, vault: Option<String>, dry_run: bool },
    /// Run the extraction engine once.
    TriggerExtraction { vault: Option<String> },
    /// Run the card discovery engine once.
    TriggerCardDiscovery { weekly: bool, vault: Option<String>, dry_run: bool },
    GetStatus,
    /// Open a persistent connection that receives every engine's progress events.
    Subscribe,
    Shutdown,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub last_run_at: Option<chrono::DateTime<chrono::Utc>>,
    pub running: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub vaults: Vec<String>,
    pub sync: EngineStatus,
    pub extraction: EngineStatus,
    pub card_discovery: EngineStatus,
    pub uptime_secs: u64,
    /// Vault ids whose extraction sandbox was recovered from a crashed run
    /// at this process's startup (§7 "recovery banner on next startup").
    pub recovered_on_last_start: Vec<String>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self { last_run_at: None, running: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerEvent {
    Progress(ProgressEvent),
    Status(DaemonStatus),
    Ack(String),
    Error(String),
}
