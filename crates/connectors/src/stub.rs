//! A deterministic in-memory connector for tests (§4.5): responses and
//! errors are configured per-id ahead of time, nothing touches the network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use memloop_vault::Secrets;
use serde_json::Value;

use crate::connector::{Connector, ConnectorError};

#[derive(Default)]
pub struct StubConnector {
    name: String,
    responses: Mutex<HashMap<String, Result<Value, ConnectorErrorSpec>>>,
    calls: Mutex<Vec<String>>,
    /// Secret keys visible at the last `fetch_by_id` call, so tests can
    /// assert the caller actually loaded and threaded secrets through.
    last_secret_keys: Mutex<Vec<String>>,
}

#[derive(Clone)]
struct ConnectorErrorSpec {
    retriable: bool,
    message: String,
}

impl StubConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            last_secret_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, id: impl Into<String>, response: Value) -> Self {
        self.responses.lock().unwrap().insert(id.into(), Ok(response));
        self
    }

    pub fn with_permanent_error(self, id: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.lock().unwrap().insert(
            id.into(),
            Err(ConnectorErrorSpec { retriable: false, message: message.into() }),
        );
        self
    }

    pub fn with_retriable_error(self, id: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.lock().unwrap().insert(
            id.into(),
            Err(ConnectorErrorSpec { retriable: true, message: message.into() }),
        );
        self
    }

    /// IDs passed to `fetch_by_id`, in call order — lets tests assert the
    /// response cache actually prevented a repeat call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Secret keys visible on the most recent `fetch_by_id` call.
    pub fn last_secret_keys(&self) -> Vec<String> {
        self.last_secret_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for StubConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_by_id(&self, id: &str, secrets: &Secrets) -> Result<Value, ConnectorError> {
        self.calls.lock().unwrap().push(id.to_string());
        *self.last_secret_keys.lock().unwrap() = secrets.keys().into_iter().map(str::to_string).collect();
        match self.responses.lock().unwrap().get(id) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(spec)) if spec.retriable => Err(ConnectorError::retriable(spec.message.clone())),
            Some(Err(spec)) => Err(ConnectorError::permanent(spec.message.clone())),
            None => Err(ConnectorError::permanent(format!("no stub response configured for id {id}"))),
        }
    }

    fn extract_fields(&self, response: &Value, sources: &[String]) -> serde_json::Map<String, Value> {
        let mut out = serde_json::Map::new();
        if let Some(obj) = response.as_object() {
            for source in sources {
                if let Some(value) = obj.get(source) {
                    out.insert(source.clone(), value.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fetch_returns_configured_response() {
        let connector = StubConnector::new("bgg").with_response("174430", json!({"rating": 8.57}));
        let response = connector.fetch_by_id("174430", &Secrets::new()).await.unwrap();
        assert_eq!(response, json!({"rating": 8.57}));
    }

    #[tokio::test]
    async fn fetch_unconfigured_id_is_permanent_error() {
        let connector = StubConnector::new("bgg");
        let err = connector.fetch_by_id("nope", &Secrets::new()).await.unwrap_err();
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn fetch_exposes_secret_keys_to_the_caller() {
        use std::collections::BTreeMap;
        let connector = StubConnector::new("bgg").with_response("174430", json!({"rating": 8.57}));
        let mut map = BTreeMap::new();
        map.insert("bgg_api_key".to_string(), "super-secret".to_string());
        let secrets = Secrets::from_map(map);

        connector.fetch_by_id("174430", &secrets).await.unwrap();
        assert_eq!(connector.last_secret_keys(), vec!["bgg_api_key".to_string()]);
    }

    #[test]
    fn extract_fields_projects_only_requested_sources() {
        let connector = StubConnector::new("bgg");
        let response = json!({"rating": 8.57, "weight": 3.87, "unused": true});
        let fields = connector.extract_fields(&response, &["rating".to_string(), "weight".to_string()]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("rating"), Some(&json!(8.57)));
    }
}
