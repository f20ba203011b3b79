//! The secrets wrapper. Secret material loaded from `<vault>/.memory-loop/secrets/*.yaml`
//! is held only behind this type: its `Debug`, `Display`, and `Serialize`
//! impls are hand-written to never expose a value, so a stray `{:?}` in a
//! log line or an accidental `serde_json::to_string` of the whole struct
//! cannot leak a secret. The only way to get a value out is `get(key)`.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Opaque holder for per-vault connector secrets. Refuses to serialize or
/// stringify its values; only `get`/`has`/`keys` expose anything, and only
/// to code that explicitly calls them.
#[derive(Clone, Default)]
pub struct Secrets {
    values: BTreeMap<String, String>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(|k| k.as_str()).collect()
    }

    pub fn merge(&mut self, other: Secrets) {
        self.values.extend(other.values);
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ProtectedSecrets]")
    }
}

impl fmt::Display for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ProtectedSecrets]")
    }
}

/// Serializes to a keys-only JSON array — values never cross this boundary.
impl Serialize for Secrets {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for key in self.values.keys() {
            seq.serialize_element(key)?;
        }
        seq.end()
    }
}
