pub mod extraction;
pub mod section_store;

pub use extraction::{
    ExtractionDriver, ExtractionResult, RunStatus, Transcript, TranscriptFrontmatter,
    discover_transcripts, parse_transcript_frontmatter,
};
pub use section_store::{AppendOutcome, Section, append_and_enforce, append_facts, enforce_size_limit, parse_sections, reconcile_sandbox, render_sections};
