//! Concrete [`LlmGateway`] backed by a local Ollama server with an
//! OpenRouter fallback — the dual-provider client pattern this codebase
//! uses for every LLM call, generalized to the gateway's single
//! `complete(prompt, restrict_to)` capability instead of a chat transcript.
//!
//! The restricted-filesystem-root half of a [`GatewayRequest`] has no native
//! enforcement here: per §9, when the host runtime has no way to sandbox a
//! subprocess/gateway, the implementation passes only the sandbox path in
//! the prompt and relies on the gateway's own path-scoping. We do the same —
//! `restrict_to` is rendered into the prompt as the only directory the model
//! is told it may write under.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::json;

use crate::gateway::{GatewayError, GatewayRequest, GatewayResponse, LlmGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenRouter,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
        }
    }

    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .context("calling ollama /api/generate")?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.context("decoding ollama response")?;
        if !status.is_success() {
            return Err(anyhow!("ollama returned status {status}: {payload}"));
        }

        payload
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("ollama response missing `response` field"))
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .timeout(timeout)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("calling openrouter chat completions")?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.context("decoding openrouter response")?;
        if !status.is_success() {
            return Err(anyhow!("openrouter returned status {status}: {payload}"));
        }

        payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("openrouter response missing choices[0].message.content"))
    }
}

/// Tries `primary`, falls back to `OpenRouter` on any transport error — the
/// same fallback shape the rest of this codebase's LLM call sites use.
#[derive(Debug, Clone)]
pub struct LlmRouter {
    ollama: OllamaClient,
    openrouter: Option<OpenRouterClient>,
    primary: Provider,
    call_timeout: Duration,
}

impl LlmRouter {
    pub fn new(ollama: OllamaClient, openrouter: Option<OpenRouterClient>, primary: Provider) -> Self {
        Self {
            ollama,
            openrouter,
            primary,
            call_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    async fn complete(&self, prompt: &str) -> Result<(Provider, String)> {
        let primary_result = match self.primary {
            Provider::Ollama => self.ollama.complete(prompt, self.call_timeout).await.map(|t| (Provider::Ollama, t)),
            Provider::OpenRouter => match &self.openrouter {
                Some(client) => client.complete(prompt, self.call_timeout).await.map(|t| (Provider::OpenRouter, t)),
                None => Err(anyhow!("no openrouter client configured")),
            },
        };

        if let Ok(result) = primary_result {
            return Ok(result);
        }

        match self.primary {
            Provider::Ollama => {
                let client = self.openrouter.as_ref().ok_or_else(|| anyhow!("primary ollama call failed and no openrouter fallback configured"))?;
                client.complete(prompt, self.call_timeout).await.map(|t| (Provider::OpenRouter, t))
            }
            Provider::OpenRouter => self.ollama.complete(prompt, self.call_timeout).await.map(|t| (Provider::Ollama, t)),
        }
    }
}

#[async_trait]
impl LlmGateway for LlmRouter {
    async fn complete(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let prompt = match &request.restrict_to {
            Some(root) => format!(
                "{}\n\nYou may only read or write files under: {}\n",
                request.prompt,
                root.display()
            ),
            None => request.prompt,
        };

        let (_provider, text) = LlmRouter::complete(self, &prompt)
            .await
            .map_err(GatewayError::Transport)?;

        Ok(GatewayResponse { text })
    }
}
