//! The in-memory, process-lifetime API response cache, keyed by
//! `(connector name, id)`. `full` sync mode clears it at run start;
//! `incremental` does not (§4.5).

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<(String, String), Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, connector: &str, id: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap()
            .get(&(connector.to_string(), id.to_string()))
            .cloned()
    }

    pub fn insert(&self, connector: &str, id: &str, response: Value) {
        self.entries
            .lock()
            .unwrap()
            .insert((connector.to_string(), id.to_string()), response);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
