//! The connector capability set itself: `fetch_by_id` and `extract_fields`.

use async_trait::async_trait;
use memloop_vault::Secrets;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    /// HTTP 429 or a transient network failure — the caller should retry
    /// with backoff, then fall back to treating it as an item error.
    Retriable,
    /// A non-429 4xx or any other failure the caller should not retry.
    Permanent,
}

/// A connector-level failure. The message MUST NOT embed any value read
/// through the Secret Store (§7, §8) — connector implementations are
/// responsible for keeping secret material out of this string entirely.
#[derive(Debug, Error)]
#[error("connector error ({kind:?}): {message}")]
pub struct ConnectorError {
    pub kind: ConnectorErrorKind,
    pub message: String,
}

impl ConnectorError {
    pub fn retriable(message: impl Into<String>) -> Self {
        Self {
            kind: ConnectorErrorKind::Retriable,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ConnectorErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind == ConnectorErrorKind::Retriable
    }
}

/// A pluggable per-source adapter. `fetch_by_id` makes the external call,
/// reading whatever API keys it needs out of `secrets` via `Secrets::get`;
/// `extract_fields` is a pure projection of the raw response onto the
/// `source` keys a pipeline's field mappings ask for.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_by_id(&self, id: &str, secrets: &Secrets) -> Result<Value, ConnectorError>;

    /// Project `response` onto `sources` (the `source` key of each field
    /// mapping). Missing sources are simply absent from the returned map —
    /// that is not itself an error; the sync engine treats an absent field
    /// as nothing-to-merge for that mapping.
    fn extract_fields(&self, response: &Value, sources: &[String]) -> serde_json::Map<String, Value>;
}
