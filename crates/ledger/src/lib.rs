//! C3 — Processing Ledger, plus the two concrete per-engine state documents
//! (extraction, card discovery) built on top of it.

pub mod ledger;
pub mod state;

pub use ledger::{Ledger, LedgerEntry};
pub use state::{CardDiscoveryState, ExtractionState};

/// The ledger key used everywhere: `(vault id, vault-relative path)`.
pub fn ledger_key(vault_id: &str, relative_path: &str) -> String {
    format!("{vault_id}:{relative_path}")
}
