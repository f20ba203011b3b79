//! Card files: a generated Q&A pair written as its own note under
//! `<vault>/.memory-loop/cards/`, with default spaced-repetition metadata
//! (§4.10). Review scheduling itself is out of scope — these fields exist
//! so a future reviewer has somewhere to write back to.
//!
//! Frontmatter keys are written in a fixed order (`id`, `type`,
//! `created_date`, `last_reviewed`, `next_review`, `ease_factor`,
//! `interval`, `repetitions`, optional `source_file`) and `id` is always
//! the filename minus its `.md` extension — the two must never drift
//! apart.

use chrono::NaiveDate;
use memloop_vault::{Vault, frontmatter, write_atomic};
use serde_yaml::{Mapping, Value};
use uuid::Uuid;

use crate::generator::GeneratedCard;

/// Write `card` as a new file under `vault.cards_dir()`, named by a fresh
/// UUID v4 that also becomes the `id` field, with default SR metadata
/// (`interval=0`, `repetitions=0`, `ease_factor=2.5`, `next_review` =
/// `today`). `source_file` is the note the card was generated from,
/// relative to the vault content root, when known.
pub async fn write_card_file(
    vault: &Vault,
    card: &GeneratedCard,
    today: NaiveDate,
    source_file: Option<&str>,
) -> anyhow::Result<std::path::PathBuf> {
    let id = Uuid::new_v4();
    let filename = format!("{id}.md");
    let path = vault.cards_dir().join(&filename);

    let mut data = Mapping::new();
    data.insert(Value::String("id".into()), Value::String(id.to_string()));
    data.insert(Value::String("type".into()), Value::String("qa".into()));
    data.insert(Value::String("created_date".into()), Value::String(today.format("%Y-%m-%d").to_string()));
    data.insert(Value::String("last_reviewed".into()), Value::Null);
    data.insert(Value::String("next_review".into()), Value::String(today.format("%Y-%m-%d").to_string()));
    data.insert(Value::String("ease_factor".into()), Value::Number(2.5.into()));
    data.insert(Value::String("interval".into()), Value::Number(0.into()));
    data.insert(Value::String("repetitions".into()), Value::Number(0.into()));
    if let Some(source_file) = source_file {
        data.insert(Value::String("source_file".into()), Value::String(source_file.to_string()));
    }

    let body = format!("## Question\n\n{}\n\n## Answer\n\n{}\n", card.question, card.answer);
    let rendered = frontmatter::serialize(&data, &body)?;
    write_atomic(&path, rendered.as_bytes()).await?;
    Ok(path)
}

/// Move a card file into `cards/archive/` (creating the directory if
/// absent), removing it from the review queue without touching its
/// metadata (§4.10 "Archival").
pub async fn archive_card(vault: &Vault, relative_path: &std::path::Path) -> anyhow::Result<()> {
    let source = vault.cards_dir().join(relative_path);
    let archive_dir = vault.cards_archive_dir();
    tokio::fs::create_dir_all(&archive_dir).await?;

    let filename = relative_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("card path has no file name: {}", relative_path.display()))?;
    let destination = archive_dir.join(filename);

    tokio::fs::rename(&source, &destination).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_card_file_emits_the_mandated_key_order_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        let card = GeneratedCard { question: "What is SM-2?".into(), answer: "A spaced-repetition algorithm.".into() };
        let today = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();

        let path = write_card_file(&vault, &card, today, Some("Note.md")).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let (data, body) = frontmatter::parse(&content).unwrap();

        let keys: Vec<String> = data.keys().map(|k| k.as_str().unwrap().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "type",
                "created_date",
                "last_reviewed",
                "next_review",
                "ease_factor",
                "interval",
                "repetitions",
                "source_file",
            ]
        );

        let id = frontmatter::get_path(&data, "id").unwrap();
        let id = id.as_str().unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{id}.md"));

        assert_eq!(frontmatter::get_path(&data, "type").unwrap(), Value::String("qa".into()));
        assert_eq!(frontmatter::get_path(&data, "created_date").unwrap(), Value::String("2026-07-26".into()));
        assert_eq!(frontmatter::get_path(&data, "last_reviewed").unwrap(), Value::Null);
        assert_eq!(frontmatter::get_path(&data, "next_review").unwrap(), Value::String("2026-07-26".into()));
        assert_eq!(frontmatter::get_path(&data, "ease_factor").unwrap(), Value::Number(2.5.into()));
        assert_eq!(frontmatter::get_path(&data, "interval").unwrap(), Value::Number(0.into()));
        assert_eq!(frontmatter::get_path(&data, "repetitions").unwrap(), Value::Number(0.into()));
        assert_eq!(frontmatter::get_path(&data, "source_file").unwrap(), Value::String("Note.md".into()));

        assert_eq!(body, "## Question\n\nWhat is SM-2?\n\n## Answer\n\nA spaced-repetition algorithm.\n");
    }

    #[tokio::test]
    async fn write_card_file_omits_source_file_when_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        let card = GeneratedCard { question: "Q".into(), answer: "A".into() };
        let today = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();

        let path = write_card_file(&vault, &card, today, None).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let (data, _) = frontmatter::parse(&content).unwrap();

        assert!(frontmatter::get_path(&data, "source_file").is_none());
    }

    #[tokio::test]
    async fn archive_moves_card_into_archive_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new("v1", dir.path());
        let card = GeneratedCard { question: "Q".into(), answer: "A".into() };
        let today = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let path = write_card_file(&vault, &card, today, None).await.unwrap();
        let relative = path.strip_prefix(vault.cards_dir()).unwrap().to_path_buf();

        archive_card(&vault, &relative).await.unwrap();

        assert!(!path.exists());
        assert!(vault.cards_archive_dir().join(&relative).exists());
    }
}
