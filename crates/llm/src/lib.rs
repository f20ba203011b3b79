//! The external LLM gateway (§6) — the one black-box capability the
//! vocabulary normalizer (C6), the sandboxed extraction driver (C9), and
//! the card discovery engine (C10) each call through. Concrete connectors
//! for third-party data providers are explicitly out of scope (§1); this
//! crate is the analogous boundary for the LLM itself: a trait plus one
//! real dual-provider implementation plus a deterministic test stub.

mod gateway;
mod router;
mod stub;

pub use gateway::{GatewayError, GatewayRequest, GatewayResponse, LlmGateway};
pub use router::{LlmRouter, OllamaClient, OpenRouterClient, Provider};
pub use stub::StubGateway;
