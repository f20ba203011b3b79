use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML frontmatter in {path}: {source}")]
    InvalidFrontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("frontmatter is not a mapping at its top level in {path}")]
    NotAMapping { path: PathBuf },

    #[error("atomic rename crossed filesystems: {from} -> {to}")]
    CrossDevice { from: PathBuf, to: PathBuf },
}
