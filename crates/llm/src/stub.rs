//! A deterministic [`LlmGateway`] stand-in for tests — per §6, "the gateway
//! is abstracted so that tests may inject a deterministic stand-in."

use std::sync::Mutex;

use async_trait::async_trait;

use crate::gateway::{GatewayError, GatewayRequest, GatewayResponse, LlmGateway};

/// Replays a fixed queue of responses in order, recording every request it
/// received so tests can assert on prompts/restrict_to without a network.
#[derive(Debug, Default)]
pub struct StubGateway {
    responses: Mutex<Vec<Result<String, GatewayError>>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl StubGateway {
    /// Queue a successful response, returned to the earliest unanswered call.
    pub fn push_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push(Ok(text.into()));
    }

    pub fn push_failure(&self) {
        self.responses.lock().unwrap().push(Err(GatewayError::Malformed));
    }

    pub fn push_timeout(&self) {
        self.responses.lock().unwrap().push(Err(GatewayError::Timeout));
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for StubGateway {
    async fn complete(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop();
        match next {
            Some(Ok(text)) => Ok(GatewayResponse { text }),
            Some(Err(err)) => Err(err),
            None => Err(GatewayError::Malformed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queued_responses_in_fifo_order() {
        let gateway = StubGateway::default();
        gateway.push_response("second");
        gateway.push_response("first");

        let first = gateway.complete(GatewayRequest::new("p1")).await.unwrap();
        assert_eq!(first.text, "first");
        let second = gateway.complete(GatewayRequest::new("p2")).await.unwrap();
        assert_eq!(second.text, "second");
    }

    #[tokio::test]
    async fn records_every_request() {
        let gateway = StubGateway::default();
        gateway.push_response("ok");
        let _ = gateway.complete(GatewayRequest::new("hello")).await;
        assert_eq!(gateway.requests().len(), 1);
        assert_eq!(gateway.requests()[0].prompt, "hello");
    }

    #[tokio::test]
    async fn empty_queue_yields_malformed_error() {
        let gateway = StubGateway::default();
        let err = gateway.complete(GatewayRequest::new("p")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed));
    }
}
