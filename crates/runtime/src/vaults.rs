//! Vault discovery: each immediate subdirectory of `paths.vaults_root` is
//! one vault, named by its directory name, with the conventional
//! `.memory-loop` inbox/metadata layout (§2, §9).

use std::path::Path;

use memloop_config::AppConfig;
use memloop_vault::Vault;

/// List every directory directly under `config.paths.vaults_root`. A vault
/// root that cannot be read (missing directory, permissions) yields an
/// empty list rather than an error — the daemon should come up and simply
/// have nothing to do yet, not refuse to start.
pub fn discover_vaults(config: &AppConfig) -> Vec<Vault> {
    let root = Path::new(&config.paths.vaults_root);
    let Ok(entries) = std::fs::read_dir(root) else {
        tracing::warn!(root = %root.display(), "vaults root is not readable; no vaults discovered");
        return Vec::new();
    };

    let mut vaults: Vec<Vault> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| {
            let id = entry.file_name().to_string_lossy().to_string();
            Vault::new(id, entry.path())
        })
        .collect();

    vaults.sort_by(|a, b| a.id.cmp(&b.id));
    vaults
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_one_vault_per_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("personal")).unwrap();
        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        std::fs::write(dir.path().join("not-a-vault.txt"), "x").unwrap();

        let mut config = AppConfig::default();
        config.paths.vaults_root = dir.path().to_string_lossy().to_string();

        let vaults = discover_vaults(&config);
        let ids: Vec<_> = vaults.iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, vec!["personal".to_string(), "work".to_string()]);
    }

    #[test]
    fn missing_root_yields_no_vaults() {
        let mut config = AppConfig::default();
        config.paths.vaults_root = "/nonexistent/vaults/root".to_string();
        assert!(discover_vaults(&config).is_empty());
    }
}
