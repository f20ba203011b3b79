//! Core vault data model and filesystem substrate: atomic writes, the
//! frontmatter store, checksums, and the secrets wrapper.
//!
//! Every other crate in this workspace that touches the vault's filesystem
//! goes through this crate rather than calling `std::fs`/`tokio::fs` directly,
//! so the atomic-write and frontmatter-parsing guarantees are enforced in one
//! place.

pub mod atomic;
pub mod checksum;
pub mod error;
pub mod frontmatter;
pub mod model;
pub mod secrets;

pub use atomic::{write_atomic, write_atomic_sync};
pub use checksum::sha256_hex;
pub use error::VaultError;
pub use frontmatter::{get_path, parse, serialize, set_path};
pub use model::{NoteFile, Vault};
pub use secrets::Secrets;
