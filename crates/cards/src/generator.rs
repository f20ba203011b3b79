//! The card generator capability (§4.10): an external LLM call turning a
//! note's content into zero or more spaced-repetition Q&A pairs.

use async_trait::async_trait;
use memloop_llm::{GatewayRequest, LlmGateway};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCard {
    pub question: String,
    pub answer: String,
}

/// The result of one generation call, mirroring the wire shape
/// `{ success, retriable?, skipped?, cards[] }` (§4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardGenOutcome {
    /// The file was too short or otherwise unsuitable for card generation.
    Skipped,
    Generated(Vec<GeneratedCard>),
    RetriableFailure(String),
    PermanentFailure(String),
}

#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate(&self, content: &str) -> CardGenOutcome;
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    success: bool,
    #[serde(default)]
    retriable: bool,
    #[serde(default)]
    skipped: bool,
    #[serde(default)]
    cards: Vec<RawCard>,
}

#[derive(Debug, Deserialize)]
struct RawCard {
    question: String,
    answer: String,
}

/// Drives card generation through the shared [`LlmGateway`], asking for a
/// JSON response in the wire shape above and parsing it back out.
pub struct LlmCardGenerator {
    gateway: std::sync::Arc<dyn LlmGateway>,
}

impl LlmCardGenerator {
    pub fn new(gateway: std::sync::Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CardGenerator for LlmCardGenerator {
    async fn generate(&self, content: &str) -> CardGenOutcome {
        let prompt = format!(
            "Generate spaced-repetition question/answer flashcards from the note below. \
             Reply with JSON only, matching: \
             {{\"success\": bool, \"skipped\": bool, \"cards\": [{{\"question\": str, \"answer\": str}}]}}. \
             Set \"skipped\": true if the note is too short or has no durable facts worth a card.\n\n{content}"
        );

        let response = match self.gateway.complete(GatewayRequest::new(prompt)).await {
            Ok(response) => response,
            Err(err) if is_retriable_gateway_error(&err) => {
                return CardGenOutcome::RetriableFailure(err.to_string());
            }
            Err(err) => return CardGenOutcome::PermanentFailure(err.to_string()),
        };

        match serde_json::from_str::<RawResponse>(response.text.trim()) {
            Ok(raw) if raw.skipped => CardGenOutcome::Skipped,
            Ok(raw) if raw.success => CardGenOutcome::Generated(
                raw.cards.into_iter().map(|c| GeneratedCard { question: c.question, answer: c.answer }).collect(),
            ),
            Ok(_) => CardGenOutcome::PermanentFailure("generator reported success: false".to_string()),
            Err(err) => CardGenOutcome::PermanentFailure(format!("malformed generator response: {err}")),
        }
    }
}

fn is_retriable_gateway_error(err: &memloop_llm::GatewayError) -> bool {
    matches!(err, memloop_llm::GatewayError::Timeout)
}
