//! C9 — Sandboxed Extraction Driver.
//!
//! Coordinates one extraction run over the transcripts discovered in a
//! vault's inbox: stage the global memory file into a writable sandbox,
//! let the LLM gateway edit it there, promote the result back through the
//! atomic writer, and keep the ledger in lockstep so a crash mid-run is
//! recoverable on the next startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use memloop_ledger::{ExtractionState, ledger_key};
use memloop_llm::{GatewayRequest, LlmGateway};
use memloop_vault::Vault;

use crate::section_store::reconcile_sandbox;

const SANDBOX_FILE_NAME: &str = "memory.sandbox.md";
/// The pre-edit snapshot of the global memory file, staged alongside the
/// sandbox copy so `commit` can diff the LLM's edits against it (§4.9 step
/// 5, §11's `duplicatesFiltered` resolution).
const SNAPSHOT_FILE_NAME: &str = "memory.snapshot.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub relative_path: PathBuf,
    pub content: String,
    pub checksum: String,
    pub frontmatter: TranscriptFrontmatter,
}

/// A minimal, line-scanned frontmatter — not a full YAML parse (§4.9): the
/// transcript format is narrow enough that scanning four known keys is
/// simpler and cheaper than invoking the YAML parser for every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptFrontmatter {
    pub date: Option<String>,
    pub time: Option<String>,
    pub session_id: Option<String>,
    pub title: Option<String>,
}

/// Scan the leading `---`-delimited block (if any) for `date:`, `time:`,
/// `session_id:`, `title:` lines. Absence of frontmatter is not an error —
/// it yields an all-`None` result.
pub fn parse_transcript_frontmatter(content: &str) -> TranscriptFrontmatter {
    let mut result = TranscriptFrontmatter::default();
    let mut lines = content.lines();

    if lines.next() != Some("---") {
        return result;
    }

    for line in lines {
        if line.trim_end() == "---" {
            break;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim();
        let value = value.trim().trim_matches('"').to_string();
        if value.is_empty() {
            continue;
        }
        match key {
            "date" => result.date = Some(value),
            "time" => result.time = Some(value),
            "session_id" => result.session_id = Some(value),
            "title" => result.title = Some(value),
            _ => {}
        }
    }

    result
}

/// List transcripts in `<vault content root>/<inbox>/chats/` that are
/// unprocessed or changed relative to `state`'s ledger.
pub fn discover_transcripts(vault: &Vault, state: &ExtractionState) -> Result<Vec<Transcript>> {
    let chats_dir = vault.chats_dir();
    if !chats_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in std::fs::read_dir(&chats_dir)
        .with_context(|| format!("reading chats directory {}", chats_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading transcript {}", path.display()))?;
        let checksum = memloop_vault::sha256_hex(content.as_bytes());

        let relative_path = path
            .strip_prefix(&vault.content_root)
            .unwrap_or(&path)
            .to_path_buf();
        let key = ledger_key(&vault.id, &relative_path.to_string_lossy());

        if state.ledger.is_processed(&key, &checksum) {
            continue;
        }

        out.push(Transcript {
            frontmatter: parse_transcript_frontmatter(&content),
            relative_path,
            content,
            checksum,
        });
    }

    out.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub status: RunStatus,
    pub transcripts_processed: usize,
    pub duplicates_filtered: usize,
}

pub struct ExtractionDriver {
    gateway: Arc<dyn LlmGateway>,
    sandbox_dir: PathBuf,
    memory_file: PathBuf,
}

impl ExtractionDriver {
    pub fn new(gateway: Arc<dyn LlmGateway>, sandbox_dir: impl Into<PathBuf>, memory_file: impl Into<PathBuf>) -> Self {
        Self {
            gateway,
            sandbox_dir: sandbox_dir.into(),
            memory_file: memory_file.into(),
        }
    }

    fn sandbox_file(&self) -> PathBuf {
        self.sandbox_dir.join(SANDBOX_FILE_NAME)
    }

    fn snapshot_file(&self) -> PathBuf {
        self.sandbox_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Crash recovery, run once at startup before the scheduler arms its
    /// trigger (§4.9 "Crash recovery").
    pub async fn recover(&self) -> Result<bool> {
        let sandbox_path = self.sandbox_file();
        if !sandbox_path.exists() {
            return Ok(false);
        }

        let sandbox_meta = tokio::fs::metadata(&sandbox_path).await?;
        let sandbox_mtime = sandbox_meta.modified()?;

        let memory_exists = self.memory_file.exists();
        if !memory_exists {
            tracing::warn!("extraction sandbox found with no global memory file — committing sandbox as canonical");
            self.commit_sandbox().await?;
            self.cleanup_sandbox().await?;
            return Ok(true);
        }

        let memory_mtime = tokio::fs::metadata(&self.memory_file).await?.modified()?;
        if sandbox_mtime > memory_mtime {
            tracing::warn!("recovering a crashed extraction run: sandbox is newer than the committed memory file");
            self.commit_sandbox().await?;
            self.cleanup_sandbox().await?;
            Ok(true)
        } else {
            tracing::info!("stale extraction sandbox found, deleting");
            self.cleanup_sandbox().await?;
            Ok(false)
        }
    }

    async fn setup_sandbox(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.sandbox_dir)
            .await
            .with_context(|| format!("creating sandbox directory {}", self.sandbox_dir.display()))?;

        let content = match tokio::fs::read_to_string(&self.memory_file).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err).context("reading global memory file"),
        };

        memloop_vault::write_atomic(&self.snapshot_file(), content.as_bytes())
            .await
            .context("staging pre-edit snapshot")?;
        memloop_vault::write_atomic(&self.sandbox_file(), content.as_bytes())
            .await
            .context("staging sandbox memory file")
    }

    /// Read the sandbox file, reconcile it against the pre-edit snapshot
    /// (falling back to the currently-committed memory file if no snapshot
    /// was staged — the crash-recovery path), enforce size, and commit.
    async fn commit_sandbox(&self) -> Result<usize> {
        let sandbox_content = tokio::fs::read_to_string(&self.sandbox_file())
            .await
            .context("reading sandbox memory file for commit")?;

        let original_content = match tokio::fs::read_to_string(&self.snapshot_file()).await {
            Ok(content) => content,
            Err(_) => match tokio::fs::read_to_string(&self.memory_file).await {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(err) => return Err(err).context("reading global memory file for recovery commit"),
            },
        };

        let (enforced, outcome) = reconcile_sandbox(&original_content, &sandbox_content);
        memloop_vault::write_atomic(&self.memory_file, enforced.as_bytes())
            .await
            .context("committing memory file")?;
        Ok(outcome.duplicates_filtered)
    }

    async fn cleanup_sandbox(&self) -> Result<()> {
        for path in [self.sandbox_file(), self.snapshot_file()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err).with_context(|| format!("cleaning up {}", path.display())),
            }
        }
        Ok(())
    }

    /// Run one extraction pass over `vault`. `state` is consumed and the
    /// caller is expected to persist the returned state regardless of the
    /// run's success (the ledger is only ever advanced on commit success).
    pub async fn run(
        &self,
        vault: &Vault,
        mut state: ExtractionState,
        now: DateTime<Utc>,
    ) -> Result<(ExtractionState, ExtractionResult)> {
        let transcripts = discover_transcripts(vault, &state)?;

        if transcripts.is_empty() {
            state.last_run_at = Some(now);
            return Ok((
                state,
                ExtractionResult { status: RunStatus::Success, transcripts_processed: 0, duplicates_filtered: 0 },
            ));
        }

        let run_result = self.run_with_transcripts(vault, &transcripts).await;

        match run_result {
            Ok(duplicates_filtered) => {
                for transcript in &transcripts {
                    let key = ledger_key(&vault.id, &transcript.relative_path.to_string_lossy());
                    state.ledger = state.ledger.mark(&key, &transcript.checksum, now);
                }
                state.last_run_at = Some(now);
                Ok((
                    state,
                    ExtractionResult {
                        status: RunStatus::Success,
                        transcripts_processed: transcripts.len(),
                        duplicates_filtered,
                    },
                ))
            }
            Err(err) => {
                tracing::error!(error = %err, "extraction run failed; cleaning up sandbox, ledger left untouched");
                let _ = self.cleanup_sandbox().await;
                Ok((
                    state,
                    ExtractionResult { status: RunStatus::Failed, transcripts_processed: 0, duplicates_filtered: 0 },
                ))
            }
        }
    }

    async fn run_with_transcripts(&self, vault: &Vault, transcripts: &[Transcript]) -> Result<usize> {
        self.setup_sandbox().await.context("sandbox setup")?;

        let prompt = build_extraction_prompt(transcripts);
        let request = GatewayRequest::restricted_to(prompt, self.sandbox_dir.clone());
        self.gateway
            .complete(request)
            .await
            .map_err(|err| anyhow::anyhow!(err))
            .context("invoking extraction gateway")?;

        let _ = vault;
        let duplicates_filtered = self.commit_sandbox().await.context("sandbox commit")?;
        self.cleanup_sandbox().await.context("sandbox cleanup")?;
        Ok(duplicates_filtered)
    }
}

fn build_extraction_prompt(transcripts: &[Transcript]) -> String {
    let mut prompt = String::from(
        "Extract durable facts worth remembering from the following transcripts. \
         Append each fact as its own line under the heading `## Extracted Facts` \
         in the memory file staged in your sandbox.\n\n",
    );
    for transcript in transcripts {
        prompt.push_str(&format!("--- {} ---\n", transcript.relative_path.display()));
        prompt.push_str(&transcript.content);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use memloop_llm::StubGateway;

    fn vault_with_chats(dir: &Path) -> Vault {
        let mut vault = Vault::new("v1", dir);
        vault.content_root = dir.to_path_buf();
        vault
    }

    #[test]
    fn parses_known_frontmatter_keys() {
        let content = "---\ndate: 2026-07-20\ntime: 14:30\nsession_id: abc123\ntitle: \"Planning call\"\n---\n\nBody\n";
        let fm = parse_transcript_frontmatter(content);
        assert_eq!(fm.date.as_deref(), Some("2026-07-20"));
        assert_eq!(fm.session_id.as_deref(), Some("abc123"));
        assert_eq!(fm.title.as_deref(), Some("Planning call"));
    }

    #[test]
    fn missing_frontmatter_is_not_an_error() {
        let fm = parse_transcript_frontmatter("Just a transcript with no header.\n");
        assert_eq!(fm, TranscriptFrontmatter::default());
    }

    #[test]
    fn discover_transcripts_skips_already_processed_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        let chats = dir.path().join("inbox/chats");
        std::fs::create_dir_all(&chats).unwrap();
        std::fs::write(chats.join("a.md"), "content a").unwrap();

        let vault = vault_with_chats(dir.path());
        let checksum = memloop_vault::sha256_hex(b"content a");
        let key = ledger_key(&vault.id, "inbox/chats/a.md");
        let mut state = ExtractionState::default();
        state.ledger = state.ledger.mark(&key, &checksum, Utc::now());

        let transcripts = discover_transcripts(&vault, &state).unwrap();
        assert!(transcripts.is_empty());
    }

    #[test]
    fn discover_transcripts_includes_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let chats = dir.path().join("inbox/chats");
        std::fs::create_dir_all(&chats).unwrap();
        std::fs::write(chats.join("a.md"), "new content").unwrap();

        let vault = vault_with_chats(dir.path());
        let key = ledger_key(&vault.id, "inbox/chats/a.md");
        let mut state = ExtractionState::default();
        state.ledger = state.ledger.mark(&key, "stale-checksum", Utc::now());

        let transcripts = discover_transcripts(&vault, &state).unwrap();
        assert_eq!(transcripts.len(), 1);
    }

    #[tokio::test]
    async fn run_with_no_transcripts_advances_last_run_with_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault_with_chats(dir.path());
        let gateway: Arc<dyn LlmGateway> = Arc::new(StubGateway::default());
        let driver = ExtractionDriver::new(gateway, dir.path().join("sandbox"), dir.path().join("memory.md"));

        let now = Utc::now();
        let (state, result) = driver.run(&vault, ExtractionState::default(), now).await.unwrap();

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.transcripts_processed, 0);
        assert_eq!(state.last_run_at, Some(now));
    }

    #[tokio::test]
    async fn run_commits_sandbox_and_marks_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let chats = dir.path().join("inbox/chats");
        std::fs::create_dir_all(&chats).unwrap();
        std::fs::write(chats.join("a.md"), "User mentioned they like chess.\n").unwrap();

        let vault = vault_with_chats(dir.path());
        let gateway = Arc::new(StubGateway::default());
        gateway.push_response("extraction acknowledged");

        let memory_file = dir.path().join("memory.md");
        let sandbox_dir = dir.path().join("sandbox");
        let driver = ExtractionDriver::new(gateway, sandbox_dir.clone(), memory_file.clone());

        let now = Utc::now();
        let (state, result) = driver.run(&vault, ExtractionState::default(), now).await.unwrap();

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.transcripts_processed, 1);
        assert!(state.ledger.is_processed(&ledger_key("v1", "inbox/chats/a.md"), &memloop_vault::sha256_hex(b"User mentioned they like chess.\n")));
        assert!(!driver.sandbox_file().exists());
        assert!(memory_file.exists());
    }

    #[tokio::test]
    async fn recover_commits_sandbox_newer_than_memory_file() {
        let dir = tempfile::tempdir().unwrap();
        let memory_file = dir.path().join("memory.md");
        let sandbox_dir = dir.path().join("sandbox");
        std::fs::write(&memory_file, "## Extracted Facts\nold fact\n").unwrap();

        std::fs::create_dir_all(&sandbox_dir).unwrap();
        std::fs::write(sandbox_dir.join(SANDBOX_FILE_NAME), "## Extracted Facts\nold fact\nnewer fact\n").unwrap();
        // Force the sandbox's mtime strictly after the memory file's.
        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let sandbox_handle = std::fs::File::options().write(true).open(sandbox_dir.join(SANDBOX_FILE_NAME)).unwrap();
        sandbox_handle.set_modified(later).unwrap();

        let gateway: Arc<dyn LlmGateway> = Arc::new(StubGateway::default());
        let driver = ExtractionDriver::new(gateway, sandbox_dir.clone(), memory_file.clone());

        let recovered = driver.recover().await.unwrap();
        assert!(recovered);
        assert!(!driver.sandbox_file().exists());
        let content = std::fs::read_to_string(&memory_file).unwrap();
        assert!(content.contains("newer fact"));
    }

    #[tokio::test]
    async fn recover_deletes_stale_sandbox_older_than_memory_file() {
        let dir = tempfile::tempdir().unwrap();
        let memory_file = dir.path().join("memory.md");
        let sandbox_dir = dir.path().join("sandbox");
        std::fs::create_dir_all(&sandbox_dir).unwrap();
        std::fs::write(sandbox_dir.join(SANDBOX_FILE_NAME), "## Extracted Facts\nstale\n").unwrap();

        let stale_time = std::time::SystemTime::now() - std::time::Duration::from_secs(600);
        let sandbox_handle = std::fs::File::options().write(true).open(sandbox_dir.join(SANDBOX_FILE_NAME)).unwrap();
        sandbox_handle.set_modified(stale_time).unwrap();

        std::fs::write(&memory_file, "## Extracted Facts\ncurrent\n").unwrap();

        let gateway: Arc<dyn LlmGateway> = Arc::new(StubGateway::default());
        let driver = ExtractionDriver::new(gateway, sandbox_dir.clone(), memory_file.clone());

        let recovered = driver.recover().await.unwrap();
        assert!(!recovered);
        assert!(!driver.sandbox_file().exists());
        let content = std::fs::read_to_string(&memory_file).unwrap();
        assert_eq!(content, "## Extracted Facts\ncurrent\n");
    }

    #[tokio::test]
    async fn recover_is_a_no_op_when_no_sandbox_exists() {
        let dir = tempfile::tempdir().unwrap();
        let gateway: Arc<dyn LlmGateway> = Arc::new(StubGateway::default());
        let driver = ExtractionDriver::new(gateway, dir.path().join("sandbox"), dir.path().join("memory.md"));
        assert!(!driver.recover().await.unwrap());
    }
}
