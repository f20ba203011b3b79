//! Connector lookup by name. Unknown names are a pipeline-level error, not
//! a fatal one (§4.5) — the sync engine reports it against that pipeline
//! and continues with the others.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connector::Connector;

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.name().to_string(), connector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubConnector;

    #[test]
    fn register_then_get_by_name() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(StubConnector::new("bgg")));
        assert!(registry.get("bgg").is_some());
        assert!(registry.get("missing").is_none());
    }
}
