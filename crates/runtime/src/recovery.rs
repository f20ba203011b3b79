//! Startup crash recovery (§4.9 "Sandbox lifecycle"): before any scheduled
//! engine loop starts, every vault's extraction sandbox is inspected and
//! either recommitted or discarded.

use std::sync::Arc;

use memloop_config::AppConfig;
use memloop_llm::LlmGateway;
use memloop_memory::ExtractionDriver;
use memloop_vault::Vault;

/// Returns the ids of vaults whose sandbox was actually recovered, so the
/// daemon can surface a startup banner over its status endpoint.
pub async fn recover_all(config: &AppConfig, gateway: Arc<dyn LlmGateway>, vaults: &[Vault]) -> Vec<String> {
    let mut recovered = Vec::new();
    for vault in vaults {
        let sandbox_dir = std::path::PathBuf::from(&config.paths.sandbox_dir).join(&vault.id);
        let memory_file = std::path::PathBuf::from(&config.paths.memory_file);
        let driver = ExtractionDriver::new(gateway.clone(), sandbox_dir, memory_file);

        match driver.recover().await {
            Ok(true) => {
                tracing::warn!(vault = %vault.id, "recovered an in-flight extraction sandbox from a previous run");
                recovered.push(vault.id.clone());
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(vault = %vault.id, error = %err, "extraction sandbox recovery failed");
            }
        }
    }
    recovered
}
