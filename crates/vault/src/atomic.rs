//! C1 — Atomic File Writer.
//!
//! Every write that targets a vault-visible path goes through here: write to
//! a sibling temp file carrying a uniqueness token, `fsync`, then `rename`
//! over the target. A crash or error at any point before the rename leaves
//! the target untouched; the temp file is best-effort removed on any error
//! path. Grounded on the event-log's `overwrite()` crash-safety pattern used
//! elsewhere in this workspace.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

fn tmp_path_for(target: &Path) -> PathBuf {
    let filename = target
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let token = uuid::Uuid::new_v4().simple().to_string();
    target.with_file_name(format!(".{filename}.{token}.tmp"))
}

/// Write `contents` to `path` atomically. Ensures the parent directory
/// exists. Callers never observe a partially-written target file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating parent directory for {}", path.display()))?;
    }

    let tmp_path = tmp_path_for(path);

    let write_result: Result<()> = async {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("writing temp file for {}", path.display()));
    }

    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("renaming into place: {}", path.display()));
    }

    Ok(())
}

/// Synchronous counterpart, used by callers that are not on a tokio runtime
/// (e.g. a `Drop`-based scope guard).
pub fn write_atomic_sync(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write as _;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory for {}", path.display()))?;
    }

    let tmp_path = tmp_path_for(path);

    let write_result: Result<()> = (|| {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(contents)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("writing temp file for {}", path.display()));
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("renaming into place: {}", path.display()));
    }

    Ok(())
}
