//! C6 — Vocabulary Normalizer. Maps a free-form string to a canonical term
//! via a local vocabulary, with an optional LLM fallback.

use std::collections::BTreeMap;

use memloop_llm::{GatewayRequest, LlmGateway};

pub type Vocabulary = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeResult {
    pub value: String,
    pub matched: bool,
}

fn canonicalize(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn local_lookup(term: &str, vocabulary: &Vocabulary) -> Option<String> {
    let needle = canonicalize(term);
    for (canonical, variations) in vocabulary {
        if canonicalize(canonical) == needle {
            return Some(canonical.clone());
        }
        if variations.iter().any(|v| canonicalize(v) == needle) {
            return Some(canonical.clone());
        }
    }
    None
}

/// Normalize a single term. `gateway`, when provided, is consulted only
/// after the local vocabulary lookup misses; its answer is accepted only
/// if it names a term already present in `vocabulary` (§4.6 step 2-3).
pub async fn normalize(
    term: &str,
    vocabulary: &Vocabulary,
    gateway: Option<&dyn LlmGateway>,
) -> NormalizeResult {
    if let Some(canonical) = local_lookup(term, vocabulary) {
        return NormalizeResult { value: canonical, matched: true };
    }

    if let Some(gateway) = gateway {
        let prompt = format!(
            "Vocabulary: {:?}\nMap the following term to one of the canonical vocabulary terms above, \
             or reply with the term unchanged if none fit: {term}",
            vocabulary.keys().collect::<Vec<_>>()
        );
        if let Ok(response) = gateway.complete(GatewayRequest::new(prompt)).await {
            let candidate = response.text.trim();
            if vocabulary.contains_key(candidate) {
                return NormalizeResult { value: candidate.to_string(), matched: true };
            }
        }
    }

    NormalizeResult { value: term.to_string(), matched: false }
}

/// Normalize an ordered list independently — no reordering (§4.6 batch mode).
pub async fn normalize_batch(
    terms: &[String],
    vocabulary: &Vocabulary,
    gateway: Option<&dyn LlmGateway>,
) -> Vec<NormalizeResult> {
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        out.push(normalize(term, vocabulary, gateway).await);
    }
    out
}
