//! C3 — Processing Ledger.
//!
//! A JSON document persisted to a known path, keyed by checksum. Corruption
//! is logged, not fatal: `load` falls back to an empty ledger and a warning,
//! mirroring how the rest of this workspace treats corrupt on-disk state
//! (the event log's corrupt-JSONL-line handling) rather than ever panicking
//! on disk content it does not control.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub checksum: String,
    pub processed_at: DateTime<Utc>,
}

/// An immutable-semantics processing ledger: `mark` returns a new value
/// rather than mutating in place, so callers that need "the ledger before
/// this item was marked" (e.g. to decide whether to persist) can keep it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ledger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`. Missing file or a document that fails
    /// schema validation both yield an empty ledger; the latter logs a
    /// warning rather than propagating an error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading ledger at {}", path.display()));
            }
        };

        match serde_json::from_str::<Self>(&raw) {
            Ok(ledger) => Ok(ledger),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "ledger failed schema validation — starting from an empty ledger"
                );
                Ok(Self::new())
            }
        }
    }

    /// Persist via the atomic file writer.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let rendered = serde_json::to_vec_pretty(self)?;
        memloop_vault::write_atomic(path, &rendered)
            .await
            .with_context(|| format!("persisting ledger to {}", path.display()))
    }

    pub fn is_processed(&self, key: &str, checksum: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.checksum == checksum)
    }

    pub fn entry(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    /// Return a new ledger with `key` marked at `checksum` and `processed_at`
    /// set to `now`.
    pub fn mark(&self, key: &str, checksum: &str, now: DateTime<Utc>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(
            key.to_string(),
            LedgerEntry {
                checksum: checksum.to_string(),
                processed_at: now,
            },
        );
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn fresh_ledger_has_nothing_processed() {
        let ledger = Ledger::new();
        assert!(!ledger.is_processed("v1:a.md", "abc"));
    }

    #[test]
    fn mark_returns_new_ledger_and_is_processed_reflects_it() {
        let ledger = Ledger::new();
        let marked = ledger.mark("v1:a.md", "abc123", now());

        assert!(!ledger.is_processed("v1:a.md", "abc123"));
        assert!(marked.is_processed("v1:a.md", "abc123"));
    }

    #[test]
    fn changed_checksum_is_not_considered_processed() {
        let ledger = Ledger::new().mark("v1:a.md", "abc123", now());
        assert!(!ledger.is_processed("v1:a.md", "def456"));
    }

    #[tokio::test]
    async fn load_missing_file_yields_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = Ledger::load(&path).unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = Ledger::new().mark("v1:a.md", "abc123", now());
        ledger.persist(&path).await.unwrap();

        let loaded = Ledger::load(&path).unwrap();
        assert!(loaded.is_processed("v1:a.md", "abc123"));
    }

    #[test]
    fn corrupt_json_falls_back_to_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{ not valid json").unwrap();

        let ledger = Ledger::load(&path).unwrap();
        assert!(ledger.is_empty());
    }
}
