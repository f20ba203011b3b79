//! The daemon orchestration crate: discovers vaults, recovers any crashed
//! extraction sandbox, then runs the sync, extraction, and card discovery
//! engines on their schedules while serving the Unix domain socket client
//! protocol (§9).

mod client;
mod commands;
mod engines;
mod recovery;
mod server;
mod vaults;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use memloop_config::AppConfig;
use memloop_llm::{LlmRouter, OllamaClient, OpenRouterClient, Provider};
use tokio::sync::watch;
use tracing::info;

pub use client::DaemonClient;
pub use commands::{ClientCommand, DaemonStatus, EngineStatus, ServerEvent};
pub use engines::{Shared, run_cards_daily, run_cards_weekly, run_extraction, run_sync};
pub use recovery::recover_all;
pub use vaults::discover_vaults;

/// Build the process-wide LLM gateway from environment configuration — the
/// same Ollama-primary/OpenRouter-fallback dual-provider client this
/// workspace's other LLM call sites use, generalized to the single
/// `complete` capability every engine here calls through.
pub fn build_gateway() -> Arc<dyn memloop_llm::LlmGateway> {
    let ollama_model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.1".to_string());
    let ollama = OllamaClient::new(ollama_model);

    let openrouter = match (env::var("OPENROUTER_API_KEY"), env::var("OPENROUTER_MODEL")) {
        (Ok(key), Ok(model)) if !key.is_empty() => Some(OpenRouterClient::new(key, model)),
        (Ok(key), Err(_)) if !key.is_empty() => Some(OpenRouterClient::new(key, "openrouter/auto")),
        _ => None,
    };

    let primary = if env::var("LLM_PROVIDER").map(|v| v == "openrouter").unwrap_or(false) {
        Provider::OpenRouter
    } else {
        Provider::Ollama
    };

    Arc::new(LlmRouter::new(ollama, openrouter, primary))
}

/// Run the daemon until a `Shutdown` command arrives or the process receives
/// a shutdown signal from the caller's own channel.
pub async fn run(config: AppConfig) -> Result<()> {
    let config = Arc::new(config);
    let vaults = discover_vaults(&config);
    info!(count = vaults.len(), "discovered vaults");

    let gateway = build_gateway();
    let recovered_sandboxes = recover_all(&config, gateway.clone(), &vaults).await;

    let shared = Arc::new(Shared::new(config.clone(), gateway, vaults, recovered_sandboxes));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    engines::spawn_loops(shared.clone(), shutdown_rx.clone());
    server::serve(shared, &config.paths.socket_path, shutdown_tx, shutdown_rx).await
}
