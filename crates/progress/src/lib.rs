//! C11 — Progress Reporter.
//!
//! Implemented as a `tokio::sync::broadcast` channel: the engine owns the
//! sending half and calls it unconditionally. A dropped or lagged receiver
//! never causes the engine to err or pause — `send` on a broadcast channel
//! with no receivers, or a receiver that falls behind and misses messages,
//! are both silently ignored here, matching §4.11's "delivery is best-effort
//! and must never fail the producing engine." Each engine run and each
//! connected wire-protocol client holds its own receiving half.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub current: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ProgressEvent {
    pub fn syncing(total: usize) -> Self {
        Self { status: ProgressStatus::Syncing, current: 0, total, current_item: None, errors: Vec::new() }
    }

    pub fn item(current: usize, total: usize, current_item: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Syncing,
            current,
            total,
            current_item: Some(current_item.into()),
            errors: Vec::new(),
        }
    }

    pub fn success(total: usize) -> Self {
        Self { status: ProgressStatus::Success, current: total, total, current_item: None, errors: Vec::new() }
    }

    pub fn error(total: usize, errors: Vec<String>) -> Self {
        Self { status: ProgressStatus::Error, current: total, total, current_item: None, errors }
    }
}

/// The sending half an engine holds for the duration of one run.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: tokio::sync::broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    /// `capacity` bounds how many events a slow subscriber can lag behind
    /// by before it starts missing events — it never blocks the sender.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Best-effort emit. A `SendError` (no receivers currently subscribed)
    /// is swallowed rather than propagated.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(256)
    }
}
