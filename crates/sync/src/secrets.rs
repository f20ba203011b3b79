//! Secrets are loaded from `<vault>/.memory-loop/secrets/*.yaml` into the
//! opaque [`Secrets`] wrapper (§4.7) — values never leave this boundary
//! except through `Secrets::get`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use memloop_vault::Secrets;

pub fn load_secrets(secrets_dir: &Path) -> Result<Secrets> {
    let mut combined = BTreeMap::new();

    if !secrets_dir.is_dir() {
        return Ok(Secrets::from_map(combined));
    }

    for entry in std::fs::read_dir(secrets_dir)
        .with_context(|| format!("reading secrets directory {}", secrets_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_yaml {
            continue;
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading secrets file {}", path.display()))?;
        let map: BTreeMap<String, String> = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing secrets file {}", path.display()))?;
        combined.extend(map);
    }

    Ok(Secrets::from_map(combined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_secrets() {
        let secrets = load_secrets(Path::new("/nonexistent/secrets")).unwrap();
        assert!(!secrets.has("anything"));
    }

    #[test]
    fn loads_and_merges_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bgg.yaml"), "bgg_api_key: super-secret\n").unwrap();
        std::fs::write(dir.path().join("other.yml"), "other_key: value\n").unwrap();

        let secrets = load_secrets(dir.path()).unwrap();
        assert_eq!(secrets.get("bgg_api_key"), Some("super-secret"));
        assert_eq!(secrets.get("other_key"), Some("value"));
    }

    #[test]
    fn non_yaml_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not yaml").unwrap();
        let secrets = load_secrets(dir.path()).unwrap();
        assert!(secrets.keys().is_empty());
    }
}
