//! Vault walk for card discovery (§4.10): hidden entries, the metadata
//! subtree, the inbox's `chats/` subtree, and `CLAUDE.md` files are all
//! excluded from consideration.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use memloop_vault::Vault;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub relative_path: PathBuf,
    pub modified_at: DateTime<Utc>,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Walk `vault.content_root`, yielding every eligible Markdown file with
/// its modification time. `within` restricts results to files modified
/// strictly after that instant (the daily pass's 24-hour window); `None`
/// returns every eligible file (the weekly catch-up's full sweep).
pub fn walk_candidates(vault: &Vault, within: Option<DateTime<Utc>>) -> Vec<Candidate> {
    let mut out = Vec::new();

    for entry in WalkDir::new(&vault.content_root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some("CLAUDE.md") {
            continue;
        }

        let Ok(relative_path) = path.strip_prefix(&vault.content_root) else { continue };
        if vault.is_excluded_subtree(relative_path) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let modified_at = system_time_to_utc(modified);

        if let Some(within) = within {
            if modified_at <= within {
                continue;
            }
        }

        out.push(Candidate { relative_path: relative_path.to_path_buf(), modified_at });
    }

    out
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &std::path::Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn excludes_metadata_chats_and_claude_md() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());

        touch(&dir.path().join("Games/Gloomhaven.md"), "content");
        touch(&dir.path().join(".memory-loop/cards/a.md"), "content");
        touch(&dir.path().join("inbox/chats/2026-01-01.md"), "content");
        touch(&dir.path().join("CLAUDE.md"), "instructions");
        touch(&dir.path().join(".hidden/secret.md"), "content");

        let candidates = walk_candidates(&vault, None);
        let paths: Vec<_> = candidates.iter().map(|c| c.relative_path.clone()).collect();

        assert_eq!(paths, vec![std::path::PathBuf::from("Games/Gloomhaven.md")]);
    }

    #[test]
    fn within_window_filters_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        touch(&dir.path().join("Old.md"), "content");

        let far_future = Utc::now() + chrono::Duration::days(1);
        let candidates = walk_candidates(&vault, Some(far_future));
        assert!(candidates.is_empty());

        let far_past = Utc::now() - chrono::Duration::days(1);
        let candidates = walk_candidates(&vault, Some(far_past));
        assert_eq!(candidates.len(), 1);
    }
}
