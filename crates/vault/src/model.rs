use std::path::{Path, PathBuf};

use serde_yaml::Mapping;

/// An immutable-per-run description of a vault: root directory, content
/// root (which may equal the root or be a subdirectory), the inbox subpath
/// (where transcripts live, under `<inbox>/chats/`), the metadata subpath
/// (where cards and per-vault config live), and whether card discovery is
/// enabled for this vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub id: String,
    pub root: PathBuf,
    pub content_root: PathBuf,
    pub inbox_subpath: String,
    pub metadata_subpath: String,
    pub cards_enabled: bool,
}

impl Vault {
    /// Construct a vault rooted at `root`, with the conventional
    /// `.memory-loop` inbox/metadata layout.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: id.into(),
            content_root: root.clone(),
            root,
            inbox_subpath: "inbox".to_string(),
            metadata_subpath: ".memory-loop".to_string(),
            cards_enabled: true,
        }
    }

    pub fn sync_config_dir(&self) -> PathBuf {
        self.root.join(".memory-loop").join("sync")
    }

    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join(".memory-loop").join("secrets")
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.content_root.join(&self.inbox_subpath).join("chats")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.content_root.join(&self.metadata_subpath)
    }

    pub fn cards_dir(&self) -> PathBuf {
        self.metadata_dir().join("cards")
    }

    pub fn cards_archive_dir(&self) -> PathBuf {
        self.cards_dir().join("archive")
    }

    /// True if `path` (vault-relative) falls under the metadata subtree or
    /// the inbox's `chats/` subtree — the two subtrees excluded from the
    /// card discovery walk, resolved against this vault's *configured*
    /// subpaths rather than hard-coded literals.
    pub fn is_excluded_subtree(&self, relative: &Path) -> bool {
        let in_metadata = relative.starts_with(&self.metadata_subpath);
        let chats_rel = Path::new(&self.inbox_subpath).join("chats");
        let in_chats = relative.starts_with(&chats_rel);
        in_metadata || in_chats
    }
}

/// A parsed note: its vault-relative path, frontmatter mapping, and body.
#[derive(Debug, Clone)]
pub struct NoteFile {
    pub relative_path: PathBuf,
    pub frontmatter: Mapping,
    pub body: String,
}

impl NoteFile {
    pub fn parse(relative_path: PathBuf, content: &str) -> Result<Self, crate::error::VaultError> {
        let (frontmatter, body) = crate::frontmatter::parse(content)?;
        Ok(Self {
            relative_path,
            frontmatter,
            body,
        })
    }

    pub fn render(&self) -> Result<String, crate::error::VaultError> {
        crate::frontmatter::serialize(&self.frontmatter, &self.body)
    }
}
