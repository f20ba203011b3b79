//! C10 — Card Discovery Engine: turns vault notes into spaced-repetition
//! flashcards via an external LLM, tracked through a processing ledger.

mod card;
mod discovery;
mod engine;
mod generator;

pub use card::{archive_card, write_card_file};
pub use discovery::{Candidate, walk_candidates};
pub use engine::{CardDiscoveryEngine, PassResult};
pub use generator::{CardGenOutcome, CardGenerator, GeneratedCard, LlmCardGenerator};
