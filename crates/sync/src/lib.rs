//! C6/C7 — Vocabulary Normalizer and Sync Engine: the external-API-to-
//! frontmatter ingestion pipeline.

mod engine;
mod merge;
mod pipeline;
mod secrets;
mod vocabulary;

pub use engine::{SyncEngine, SyncItemError, SyncMode, SyncOptions, SyncResult, SyncStatus};
pub use merge::apply_merge;
pub use pipeline::{Defaults, FieldMapping, MatchConfig, MergeStrategy, PipelineConfig, PipelineConfigError};
pub use secrets::load_secrets;
pub use vocabulary::{NormalizeResult, Vocabulary, normalize, normalize_batch};
