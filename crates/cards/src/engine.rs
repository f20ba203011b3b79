//! C10 — Card Discovery Engine: daily pass, weekly catch-up, archival.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use memloop_ledger::{CardDiscoveryState, ledger_key};
use memloop_progress::{ProgressEvent, ProgressReporter};
use memloop_vault::Vault;

use crate::card::write_card_file;
use crate::discovery::{Candidate, walk_candidates};
use crate::generator::{CardGenOutcome, CardGenerator};

#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub files_considered: usize,
    pub successfully_handled: usize,
    pub retriable_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub cards_created: usize,
}

impl PassResult {
    /// §4.10 "Run-success classification": successful iff more files were
    /// durably handled than deferred as retriable.
    pub fn is_successful(&self) -> bool {
        self.successfully_handled > self.retriable_count
    }
}

pub struct CardDiscoveryEngine {
    generator: Arc<dyn CardGenerator>,
    weekly_budget_bytes: u64,
    /// Run generation but skip writing card files and advancing the ledger
    /// or last-run timestamps, for diagnosing candidate selection.
    dry_run: bool,
}

impl CardDiscoveryEngine {
    pub fn new(generator: Arc<dyn CardGenerator>, weekly_budget_bytes: u64) -> Self {
        Self { generator, weekly_budget_bytes, dry_run: false }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The daily pass (§4.10): files under `vault` modified in the last 24
    /// hours, oldest ledger state permitting.
    pub async fn run_daily(
        &self,
        vault: &Vault,
        mut state: CardDiscoveryState,
        now: DateTime<Utc>,
        progress: Option<&ProgressReporter>,
    ) -> anyhow::Result<(CardDiscoveryState, PassResult)> {
        let within = now - chrono::Duration::hours(24);
        let candidates = walk_candidates(vault, Some(within));

        let (new_state, result) = self.process_candidates(vault, state.ledger, candidates, now, progress).await?;
        state.ledger = new_state;

        if result.is_successful() && !self.dry_run {
            state.last_daily_run = Some(now);
        }

        Ok((state, result))
    }

    /// The weekly catch-up pass (§4.10): oldest-first by mtime, bounded by
    /// a per-ISO-week byte budget that resets on the Monday boundary.
    pub async fn run_weekly(
        &self,
        vault: &Vault,
        mut state: CardDiscoveryState,
        now: DateTime<Utc>,
        progress: Option<&ProgressReporter>,
    ) -> anyhow::Result<(CardDiscoveryState, PassResult)> {
        state.roll_weekly_budget(now.date_naive());

        let mut candidates = walk_candidates(vault, None);
        candidates.sort_by_key(|c| c.modified_at);

        let mut budgeted = Vec::new();
        let mut remaining = state.remaining_weekly_budget(self.weekly_budget_bytes);

        for candidate in candidates {
            let Ok(metadata) = std::fs::metadata(vault.content_root.join(&candidate.relative_path)) else { continue };
            let size = metadata.len();
            if size > remaining {
                break;
            }
            remaining -= size;
            state.weekly_budget_used_bytes += size;
            budgeted.push(candidate);
        }

        let (new_ledger, result) = self.process_candidates(vault, state.ledger, budgeted, now, progress).await?;
        state.ledger = new_ledger;
        if !self.dry_run {
            state.last_weekly_run = Some(now);
        }

        Ok((state, result))
    }

    async fn process_candidates(
        &self,
        vault: &Vault,
        mut ledger: memloop_ledger::Ledger,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
        progress: Option<&ProgressReporter>,
    ) -> anyhow::Result<(memloop_ledger::Ledger, PassResult)> {
        let mut result = PassResult::default();
        let total = candidates.len();

        if let Some(progress) = progress {
            progress.emit(ProgressEvent::syncing(total));
        }

        for (index, candidate) in candidates.into_iter().enumerate() {
            result.files_considered += 1;
            let absolute_path = vault.content_root.join(&candidate.relative_path);
            let key = ledger_key(&vault.id, &candidate.relative_path.to_string_lossy());

            let content = match tokio::fs::read_to_string(&absolute_path).await {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(path = %absolute_path.display(), error = %err, "card discovery could not read file");
                    result.error_count += 1;
                    continue;
                }
            };
            let checksum = memloop_vault::sha256_hex(content.as_bytes());

            if ledger.is_processed(&key, &checksum) {
                continue;
            }

            match self.generator.generate(&content).await {
                CardGenOutcome::Skipped => {
                    if !self.dry_run {
                        ledger = ledger.mark(&key, &checksum, now);
                    }
                    result.skipped_count += 1;
                    result.successfully_handled += 1;
                }
                CardGenOutcome::Generated(cards) => {
                    let today = now.date_naive();
                    let source_file = candidate.relative_path.to_str();
                    for card in &cards {
                        if !self.dry_run {
                            write_card_file(vault, card, today, source_file).await?;
                        }
                        result.cards_created += 1;
                    }
                    if !self.dry_run {
                        ledger = ledger.mark(&key, &checksum, now);
                    }
                    result.successfully_handled += 1;
                }
                CardGenOutcome::RetriableFailure(message) => {
                    tracing::warn!(path = %absolute_path.display(), %message, "card generation failed, will retry");
                    result.retriable_count += 1;
                }
                CardGenOutcome::PermanentFailure(message) => {
                    tracing::error!(path = %absolute_path.display(), %message, "card generation failed permanently");
                    if !self.dry_run {
                        ledger = ledger.mark(&key, &checksum, now);
                    }
                    result.error_count += 1;
                }
            }

            if let Some(progress) = progress {
                progress.emit(ProgressEvent::item(index + 1, total, candidate.relative_path.display().to_string()));
            }
        }

        if let Some(progress) = progress {
            progress.emit(ProgressEvent::success(result.files_considered));
        }

        Ok((ledger, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratedCard;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<Vec<CardGenOutcome>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<CardGenOutcome>) -> Self {
            Self { responses: Mutex::new(responses) }
        }
    }

    #[async_trait]
    impl CardGenerator for ScriptedGenerator {
        async fn generate(&self, _content: &str) -> CardGenOutcome {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                CardGenOutcome::Skipped
            } else {
                responses.remove(0)
            }
        }
    }

    fn write_note(dir: &std::path::Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn daily_pass_creates_cards_and_marks_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        write_note(dir.path(), "Note.md", "some durable content");

        let generator = Arc::new(ScriptedGenerator::new(vec![CardGenOutcome::Generated(vec![
            GeneratedCard { question: "Q".into(), answer: "A".into() },
        ])]));
        let engine = CardDiscoveryEngine::new(generator, 500 * 1024);

        let now = Utc::now();
        let (state, result) = engine.run_daily(&vault, CardDiscoveryState::default(), now, None).await.unwrap();

        assert_eq!(result.cards_created, 1);
        assert!(result.is_successful());
        assert_eq!(state.last_daily_run, Some(now));
        assert_eq!(std::fs::read_dir(vault.cards_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn unchanged_processed_file_is_skipped_on_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        write_note(dir.path(), "Note.md", "some durable content");

        let generator = Arc::new(ScriptedGenerator::new(vec![CardGenOutcome::Skipped]));
        let engine = CardDiscoveryEngine::new(generator, 500 * 1024);
        let now = Utc::now();

        let (state, first) = engine.run_daily(&vault, CardDiscoveryState::default(), now, None).await.unwrap();
        assert_eq!(first.skipped_count, 1);

        let (_, second) = engine.run_daily(&vault, state, now, None).await.unwrap();
        assert_eq!(second.files_considered, 0);
    }

    #[tokio::test]
    async fn retriable_failure_does_not_mark_ledger_and_run_is_not_successful() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        write_note(dir.path(), "Note.md", "content");

        let generator = Arc::new(ScriptedGenerator::new(vec![CardGenOutcome::RetriableFailure("rate limited".into())]));
        let engine = CardDiscoveryEngine::new(generator, 500 * 1024);
        let now = Utc::now();

        let (state, result) = engine.run_daily(&vault, CardDiscoveryState::default(), now, None).await.unwrap();

        assert_eq!(result.retriable_count, 1);
        assert!(!result.is_successful());
        assert_eq!(state.last_daily_run, None);
        let key = ledger_key("v1", "Note.md");
        assert!(state.ledger.entry(&key).is_none());
    }

    #[tokio::test]
    async fn permanent_failure_marks_ledger_to_avoid_infinite_retries() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        write_note(dir.path(), "Note.md", "content");

        let generator = Arc::new(ScriptedGenerator::new(vec![CardGenOutcome::PermanentFailure("bad model output".into())]));
        let engine = CardDiscoveryEngine::new(generator, 500 * 1024);
        let now = Utc::now();

        let (state, result) = engine.run_daily(&vault, CardDiscoveryState::default(), now, None).await.unwrap();

        assert_eq!(result.error_count, 1);
        let key = ledger_key("v1", "Note.md");
        assert!(state.ledger.entry(&key).is_some());
    }

    #[tokio::test]
    async fn weekly_catchup_stops_when_budget_would_be_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        write_note(dir.path(), "A.md", &"x".repeat(100));
        write_note(dir.path(), "B.md", &"y".repeat(100));

        let generator = Arc::new(ScriptedGenerator::new(vec![CardGenOutcome::Skipped, CardGenOutcome::Skipped]));
        let engine = CardDiscoveryEngine::new(generator, 150);

        let now = Utc::now();
        let (_, result) = engine.run_weekly(&vault, CardDiscoveryState::default(), now, None).await.unwrap();

        assert_eq!(result.files_considered, 1);
    }
}
