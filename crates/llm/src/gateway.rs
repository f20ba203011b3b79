//! The external LLM gateway capability (§6): "given a prompt and a
//! restricted filesystem root, return when the task is complete or fails."
//!
//! One trait is shared by all three callers in this workspace — the
//! vocabulary normalizer (C6), the sandboxed extraction driver (C9), and the
//! card generator (C10) — because the spec treats the gateway itself as a
//! single black-box capability; it is the caller's prompt and interpretation
//! of the response that differs.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A request to the gateway. `restrict_to`, when set, is the only
/// filesystem root the gateway is permitted to read or write under — the
/// extraction driver passes the sandbox directory here and never the real
/// vault or global memory file path (§9 "Sandbox isolation").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub prompt: String,
    pub restrict_to: Option<PathBuf>,
}

impl GatewayRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            restrict_to: None,
        }
    }

    pub fn restricted_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.restrict_to = Some(root.into());
        self
    }
}

/// The gateway's terminal event: the task completed and produced `text`.
/// For sandboxed requests `text` is typically a short confirmation; the
/// caller re-reads the sandboxed file from disk rather than trusting the
/// gateway's response body for file content.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("gateway call timed out")]
    Timeout,
    #[error("gateway returned a non-terminal or malformed response")]
    Malformed,
}

/// The single capability every caller in this workspace uses. Abstracted
/// so tests can inject a deterministic stand-in ([`crate::stub::StubGateway`])
/// instead of making a real network call.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

#[async_trait]
impl<T: LlmGateway + ?Sized> LlmGateway for std::sync::Arc<T> {
    async fn complete(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        (**self).complete(request).await
    }
}
