//! The three engine task loops (§9 "module-level state"): each composes the
//! scheduler primitives (trigger, re-entrancy guard, clock) from
//! `memloop-scheduler` around the corresponding engine crate, the way the
//! daemon's background tasks in this workspace have always been structured
//! — one `tokio::select!` loop per concern, polling on an interval and
//! exiting on a shared shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Timelike, Utc};
use memloop_cards::{CardDiscoveryEngine, LlmCardGenerator};
use memloop_config::AppConfig;
use memloop_connectors::ConnectorRegistry;
use memloop_ledger::{CardDiscoveryState, ExtractionState};
use memloop_llm::LlmGateway;
use memloop_memory::ExtractionDriver;
use memloop_progress::ProgressReporter;
use memloop_scheduler::{DailyTrigger, ReentrancyGuard, is_stale, is_sunday};
use memloop_sync::{SyncEngine, SyncMode, SyncOptions};
use memloop_vault::Vault;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

/// Shared across every engine loop and every socket connection.
pub struct Shared {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn LlmGateway>,
    pub vaults: Vec<Vault>,
    pub progress: ProgressReporter,

    pub sync_engine: SyncEngine,
    pub sync_guard: ReentrancyGuard,
    pub sync_last_run: Mutex<Option<chrono::DateTime<Utc>>>,

    pub extraction_guard: ReentrancyGuard,
    pub extraction_last_run: Mutex<Option<chrono::DateTime<Utc>>>,

    pub cards_guard: ReentrancyGuard,
    pub cards_last_run: Mutex<Option<chrono::DateTime<Utc>>>,

    /// Vault ids whose extraction sandbox was recovered from a crashed run
    /// during this process's startup (§7 "recovery banner on next startup").
    pub recovered_sandboxes: Vec<String>,
}

impl Shared {
    pub fn new(
        config: Arc<AppConfig>,
        gateway: Arc<dyn LlmGateway>,
        vaults: Vec<Vault>,
        recovered_sandboxes: Vec<String>,
    ) -> Self {
        let sync_engine = SyncEngine::new(ConnectorRegistry::new(), Some(gateway.clone()));
        Self {
            config,
            gateway,
            vaults,
            progress: ProgressReporter::default(),
            sync_engine,
            sync_guard: ReentrancyGuard::new(),
            sync_last_run: Mutex::new(None),
            extraction_guard: ReentrancyGuard::new(),
            extraction_last_run: Mutex::new(None),
            cards_guard: ReentrancyGuard::new(),
            cards_last_run: Mutex::new(None),
            recovered_sandboxes,
        }
    }

    fn vault_by_id(&self, id: &str) -> Option<&Vault> {
        self.vaults.iter().find(|v| v.id == id)
    }
}

/// Run the sync engine once, across every vault (or just `only_vault` if given).
pub async fn run_sync(
    shared: &Shared,
    mode: SyncMode,
    pipeline: Option<&str>,
    only_vault: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let Some(_permit) = shared.sync_guard.try_begin("sync") else {
        return Ok(());
    };

    let targets: Vec<&Vault> = match only_vault {
        Some(id) => shared.vault_by_id(id).into_iter().collect(),
        None => shared.vaults.iter().collect(),
    };

    let options = SyncOptions {
        mode,
        pipeline_filter: pipeline.map(str::to_string),
        incremental_threshold_hours: shared.config.scheduler.sync_incremental_threshold_hours,
        dry_run,
    };

    for vault in targets {
        let now = Utc::now();
        match shared.sync_engine.run(vault, &options, now, Some(&shared.progress)).await {
            Ok(result) => info!(vault = %vault.id, summary = %result.summary(), "sync run complete"),
            Err(err) => error!(vault = %vault.id, error = %err, "sync run failed"),
        }
    }

    if !dry_run {
        *shared.sync_last_run.lock().await = Some(Utc::now());
    }
    Ok(())
}

/// Run the extraction engine once, across every vault (or just `only_vault`).
pub async fn run_extraction(shared: &Shared, only_vault: Option<&str>) -> Result<()> {
    let Some(_permit) = shared.extraction_guard.try_begin("extraction") else {
        return Ok(());
    };

    let state_path = shared.config.extraction_state_path();
    let mut state = ExtractionState::load(&state_path)?;

    let targets: Vec<&Vault> = match only_vault {
        Some(id) => shared.vault_by_id(id).into_iter().collect(),
        None => shared.vaults.iter().collect(),
    };

    for vault in targets {
        let sandbox_dir = std::path::PathBuf::from(&shared.config.paths.sandbox_dir).join(&vault.id);
        let memory_file = std::path::PathBuf::from(&shared.config.paths.memory_file);
        let driver = ExtractionDriver::new(shared.gateway.clone(), sandbox_dir, memory_file);

        let now = Utc::now();
        match driver.run(vault, state.clone(), now).await {
            Ok((new_state, result)) => {
                state = new_state;
                info!(
                    vault = %vault.id,
                    transcripts = result.transcripts_processed,
                    duplicates_filtered = result.duplicates_filtered,
                    "extraction run complete"
                );
            }
            Err(err) => error!(vault = %vault.id, error = %err, "extraction run failed"),
        }
        state.persist(&state_path).await?;
    }

    *shared.extraction_last_run.lock().await = Some(Utc::now());
    Ok(())
}

/// Run the card discovery engine's daily pass once.
pub async fn run_cards_daily(shared: &Shared, only_vault: Option<&str>, dry_run: bool) -> Result<()> {
    let Some(_permit) = shared.cards_guard.try_begin("card_discovery") else {
        return Ok(());
    };
    run_cards(shared, only_vault, false, dry_run).await
}

/// Run the card discovery engine's weekly catch-up pass once.
pub async fn run_cards_weekly(shared: &Shared, only_vault: Option<&str>, dry_run: bool) -> Result<()> {
    let Some(_permit) = shared.cards_guard.try_begin("card_discovery") else {
        return Ok(());
    };
    run_cards(shared, only_vault, true, dry_run).await
}

async fn run_cards(shared: &Shared, only_vault: Option<&str>, weekly: bool, dry_run: bool) -> Result<()> {
    let state_path = shared.config.card_discovery_state_path();
    let mut state = CardDiscoveryState::load(&state_path)?;

    let generator = Arc::new(LlmCardGenerator::new(shared.gateway.clone()));
    let engine = CardDiscoveryEngine::new(generator, shared.config.scheduler.card_discovery_weekly_budget_bytes)
        .with_dry_run(dry_run);

    let targets: Vec<&Vault> = match only_vault {
        Some(id) => shared.vault_by_id(id).into_iter().collect(),
        None => shared.vaults.iter().filter(|v| v.cards_enabled).collect(),
    };

    for vault in targets {
        let now = Utc::now();
        let outcome = if weekly {
            engine.run_weekly(vault, state.clone(), now, Some(&shared.progress)).await
        } else {
            engine.run_daily(vault, state.clone(), now, Some(&shared.progress)).await
        };

        match outcome {
            Ok((new_state, result)) => {
                state = new_state;
                info!(
                    vault = %vault.id,
                    weekly,
                    cards_created = result.cards_created,
                    successful = result.successfully_handled,
                    retriable = result.retriable_count,
                    "card discovery pass complete"
                );
            }
            Err(err) => error!(vault = %vault.id, weekly, error = %err, "card discovery pass failed"),
        }
        if !dry_run {
            state.persist(&state_path).await?;
        }
    }

    if !dry_run {
        *shared.cards_last_run.lock().await = Some(Utc::now());
    }
    Ok(())
}

/// Spawn the three scheduled background loops. Each polls on a short
/// interval and decides independently whether its trigger has fired,
/// rather than sleeping for the full period — this is what lets an
/// on-demand trigger (via the socket) and the scheduled loop share the
/// same re-entrancy guard without racing.
pub fn spawn_loops(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let poll_interval = Duration::from_secs(60);

    {
        let shared = shared.clone();
        let mut shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
                let last_run = *shared.sync_last_run.lock().await;
                if is_stale(last_run, Utc::now(), shared.config.scheduler.sync_incremental_threshold_hours) {
                    if let Err(err) = run_sync(&shared, SyncMode::Incremental, None, None, false).await {
                        warn!(error = %err, "scheduled sync run failed");
                    }
                }
            }
        });
    }

    {
        let shared = shared.clone();
        let mut shutdown = shutdown.clone();
        tokio::spawn(async move {
            let trigger = match DailyTrigger::parse(&shared.config.scheduler.extraction_schedule) {
                Ok(trigger) => trigger,
                Err(err) => {
                    error!(error = %err, "invalid extraction schedule, extraction loop disabled");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
                let last_run = *shared.extraction_last_run.lock().await;
                let now = Utc::now();
                let due = trigger.has_fired(last_run, now)
                    || is_stale(last_run, now, shared.config.scheduler.extraction_catchup_hours);
                if due {
                    if let Err(err) = run_extraction(&shared, None).await {
                        warn!(error = %err, "scheduled extraction run failed");
                    }
                }
            }
        });
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
            }
            let now = Utc::now();
            let configured_hour = shared.config.scheduler.card_discovery_hour as u32;
            if now.hour() != configured_hour {
                continue;
            }

            let last_daily = {
                let path = shared.config.card_discovery_state_path();
                CardDiscoveryState::load(&path).ok().and_then(|s| s.last_daily_run)
            };
            if is_stale(last_daily, now, 20) {
                if let Err(err) = run_cards_daily(&shared, None, false).await {
                    warn!(error = %err, "scheduled card discovery daily pass failed");
                }
            }

            if is_sunday(now) {
                let last_weekly = {
                    let path = shared.config.card_discovery_state_path();
                    CardDiscoveryState::load(&path).ok().and_then(|s| s.last_weekly_run)
                };
                if is_stale(last_weekly, now, 6 * 24) {
                    if let Err(err) = run_cards_weekly(&shared, None, false).await {
                        warn!(error = %err, "scheduled card discovery weekly catch-up failed");
                    }
                }
            }
        }
    });
}
