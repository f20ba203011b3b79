//! C5 — Connector Plumbing: the pluggable per-source fetch/extract
//! interface, the in-memory API response cache, and the retry/backoff
//! policy shared by every connector call the sync engine makes.
//!
//! Concrete connectors for third-party data providers (a BoardGameGeek-style
//! XML client, etc.) are out of scope (§4.5) — this crate only provides the
//! trait, the cache, the backoff policy, and a deterministic in-memory stub
//! connector for tests.

mod cache;
mod connector;
mod registry;
mod retry;
mod stub;

pub use cache::ResponseCache;
pub use connector::{Connector, ConnectorError, ConnectorErrorKind};
pub use registry::ConnectorRegistry;
pub use retry::{RetryPolicy, with_retry};
pub use stub::StubConnector;
