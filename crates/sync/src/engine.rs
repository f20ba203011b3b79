//! C7 — Sync Engine: orchestrates pipelines — match → fetch → normalize →
//! merge → write frontmatter (§4.7).

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use globset::Glob;
use memloop_connectors::{ConnectorRegistry, ResponseCache, RetryPolicy, with_retry};
use memloop_llm::LlmGateway;
use memloop_progress::{ProgressEvent, ProgressReporter};
use memloop_vault::{Secrets, Vault, frontmatter, write_atomic};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::merge::apply_merge;
use crate::pipeline::PipelineConfig;
use crate::secrets::load_secrets;
use crate::vocabulary::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct SyncItemError {
    pub file: String,
    pub pipeline: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub files_processed: usize,
    pub files_updated: usize,
    pub errors: Vec<SyncItemError>,
    pub duration_ms: u64,
    /// Names of pipeline files that failed schema validation and were
    /// skipped (§4.7 "invalid files are reported and skipped").
    pub skipped_pipelines: Vec<String>,
}

impl SyncResult {
    /// The one-line user-visible summary (§7).
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Synced {}/{} files ({} errors)",
            self.files_updated,
            self.files_processed,
            self.errors.len()
        );
        if !self.skipped_pipelines.is_empty() {
            line.push_str(&format!(". Skipped {} invalid pipelines", self.skipped_pipelines.len()));
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub pipeline_filter: Option<String>,
    pub incremental_threshold_hours: u32,
    /// Run matching/fetch/merge logic but skip the final atomic write, for
    /// diagnosing a pipeline's configuration without mutating the vault.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Full,
            pipeline_filter: None,
            incremental_threshold_hours: 24,
            dry_run: false,
        }
    }
}

pub struct SyncEngine {
    connectors: ConnectorRegistry,
    gateway: Option<Arc<dyn LlmGateway>>,
    cache: ResponseCache,
}

impl SyncEngine {
    pub fn new(connectors: ConnectorRegistry, gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { connectors, gateway, cache: ResponseCache::new() }
    }

    pub async fn run(
        &self,
        vault: &Vault,
        options: &SyncOptions,
        now: DateTime<Utc>,
        progress: Option<&ProgressReporter>,
    ) -> anyhow::Result<SyncResult> {
        let started = Instant::now();
        if options.mode == SyncMode::Full {
            self.cache.clear();
        }

        let secrets = load_secrets(&vault.secrets_dir()).with_context(|| {
            format!("loading secrets for vault {}", vault.id)
        })?;

        let (configs, skipped_pipelines) = load_pipeline_configs(&vault.sync_config_dir());
        let configs: Vec<_> = configs
            .into_iter()
            .filter(|c| options.pipeline_filter.as_deref().is_none_or(|name| c.name == name))
            .collect();

        let relative_paths = collect_markdown_paths(&vault.root);

        let mut result = SyncResult {
            status: SyncStatus::Success,
            files_processed: 0,
            files_updated: 0,
            errors: Vec::new(),
            duration_ms: 0,
            skipped_pipelines,
        };

        for config in &configs {
            self.run_pipeline(vault, config, options, now, &relative_paths, &secrets, progress, &mut result)
                .await;
        }

        result.status = if result.errors.is_empty() { SyncStatus::Success } else { SyncStatus::Error };
        result.duration_ms = started.elapsed().as_millis() as u64;

        if let Some(progress) = progress {
            progress.emit(match result.status {
                SyncStatus::Success => ProgressEvent::success(result.files_processed),
                SyncStatus::Error => ProgressEvent::error(
                    result.files_processed,
                    result.errors.iter().map(|e| e.message.clone()).collect(),
                ),
            });
        }

        Ok(result)
    }

    async fn run_pipeline(
        &self,
        vault: &Vault,
        config: &PipelineConfig,
        options: &SyncOptions,
        now: DateTime<Utc>,
        relative_paths: &[std::path::PathBuf],
        secrets: &Secrets,
        progress: Option<&ProgressReporter>,
        result: &mut SyncResult,
    ) {
        let Ok(glob) = Glob::new(&config.match_config.pattern) else {
            result.errors.push(SyncItemError {
                file: String::new(),
                pipeline: config.name.clone(),
                message: format!("invalid match pattern: {}", config.match_config.pattern),
            });
            return;
        };
        let matcher = glob.compile_matcher();

        let Some(connector) = self.connectors.get(&config.connector) else {
            result.errors.push(SyncItemError {
                file: String::new(),
                pipeline: config.name.clone(),
                message: format!("unknown connector: {}", config.connector),
            });
            return;
        };

        let matched: Vec<_> = relative_paths
            .iter()
            .filter(|path| matcher.is_match(normalize_slashes(path)))
            .collect();
        let total = matched.len();

        if let Some(progress) = progress {
            progress.emit(ProgressEvent::syncing(total));
        }

        for (index, relative_path) in matched.into_iter().enumerate() {
            let absolute_path = vault.root.join(relative_path);
            result.files_processed += 1;

            let process_result = self
                .process_file(config, options, now, &absolute_path, relative_path, connector.as_ref(), secrets)
                .await;

            match process_result {
                Ok(true) => result.files_updated += 1,
                Ok(false) => {}
                Err(message) => result.errors.push(SyncItemError {
                    file: relative_path.display().to_string(),
                    pipeline: config.name.clone(),
                    message,
                }),
            }

            if let Some(progress) = progress {
                progress.emit(ProgressEvent::item(index + 1, total, relative_path.display().to_string()));
            }
        }
    }

    /// Returns `Ok(true)` if the file was updated, `Ok(false)` if it was
    /// skipped (recent / missing id), `Err(message)` on a per-file error.
    async fn process_file(
        &self,
        config: &PipelineConfig,
        options: &SyncOptions,
        now: DateTime<Utc>,
        absolute_path: &Path,
        relative_path: &Path,
        connector: &dyn memloop_connectors::Connector,
        secrets: &Secrets,
    ) -> Result<bool, String> {
        let content = tokio::fs::read_to_string(absolute_path)
            .await
            .map_err(|err| format!("reading file: {err}"))?;
        let (mut data, body) = frontmatter::parse(&content).map_err(|err| format!("parsing frontmatter: {err}"))?;

        if options.mode == SyncMode::Incremental {
            if let Some(last_synced) = frontmatter::get_path(&data, "_sync_meta.last_synced")
                .and_then(|v| v.as_str().map(str::to_string))
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            {
                let last_synced = last_synced.with_timezone(&Utc);
                let hours_since = now.signed_duration_since(last_synced).num_hours();
                if hours_since < options.incremental_threshold_hours as i64 {
                    return Ok(false);
                }
            }
        }

        let id = match frontmatter::get_path(&data, &config.match_config.field) {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Ok(false),
        };

        let response = match self.cache.get(&config.connector, &id) {
            Some(cached) => cached,
            None => {
                let response = with_retry(RetryPolicy::default(), || connector.fetch_by_id(&id, secrets))
                    .await
                    .map_err(|err| err.message)?;
                self.cache.insert(&config.connector, &id, response.clone());
                response
            }
        };

        let sources: Vec<String> = config.fields.iter().map(|f| f.source.clone()).collect();
        let extracted = connector.extract_fields(&response, &sources);

        for field in &config.fields {
            let Some(raw_value) = extracted.get(&field.source) else { continue };
            let value: Value = serde_json::from_value(raw_value.clone())
                .unwrap_or_else(|_| Value::String(raw_value.to_string()));

            let value = if field.normalize {
                normalize_value(&value, &config.vocabulary, self.gateway.as_deref()).await
            } else {
                value
            };

            let target = config.effective_target(field);
            let strategy = config.effective_strategy(field);
            let existing = frontmatter::get_path(&data, &target);

            if let Some(new_value) = apply_merge(strategy, existing.as_ref(), &value) {
                frontmatter::set_path(&mut data, &target, new_value);
            }
        }

        let mut sync_meta = serde_yaml::Mapping::new();
        sync_meta.insert(Value::String("last_synced".into()), Value::String(now.to_rfc3339()));
        sync_meta.insert(Value::String("source".into()), Value::String(config.connector.clone()));
        sync_meta.insert(Value::String("source_id".into()), Value::String(id));
        frontmatter::set_path(&mut data, "_sync_meta", Value::Mapping(sync_meta));

        let rendered = frontmatter::serialize(&data, &body).map_err(|err| format!("serializing frontmatter: {err}"))?;
        if !options.dry_run {
            write_atomic(absolute_path, rendered.as_bytes())
                .await
                .map_err(|err| format!("writing file: {err}"))?;
        }

        Ok(true)
    }
}

fn normalize_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn load_pipeline_configs(sync_dir: &Path) -> (Vec<PipelineConfig>, Vec<String>) {
    let mut configs = Vec::new();
    let mut skipped = Vec::new();

    let Ok(entries) = std::fs::read_dir(sync_dir) else {
        return (configs, skipped);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_yaml {
            continue;
        }

        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        match std::fs::read_to_string(&path).ok().and_then(|raw| PipelineConfig::parse(&raw).ok()) {
            Some(config) => configs.push(config),
            None => {
                tracing::warn!(path = %path.display(), "invalid pipeline config skipped");
                skipped.push(name);
            }
        }
    }

    (configs, skipped)
}

fn collect_markdown_paths(root: &Path) -> Vec<std::path::PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(|p| p.to_path_buf()))
        .collect()
}

async fn normalize_value(
    value: &Value,
    vocabulary: &crate::vocabulary::Vocabulary,
    gateway: Option<&dyn LlmGateway>,
) -> Value {
    match value {
        Value::String(s) => {
            let result = normalize(s, vocabulary, gateway).await;
            Value::String(result.value)
        }
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let stringified = match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                };
                match stringified {
                    Some(s) => {
                        let result = normalize(&s, vocabulary, gateway).await;
                        out.push(Value::String(result.value));
                    }
                    None => out.push(item.clone()),
                }
            }
            Value::Sequence(out)
        }
        Value::Number(n) => {
            let result = normalize(&n.to_string(), vocabulary, gateway).await;
            Value::String(result.value)
        }
        Value::Bool(b) => {
            let result = normalize(&b.to_string(), vocabulary, gateway).await;
            Value::String(result.value)
        }
        other => other.clone(),
    }
}
