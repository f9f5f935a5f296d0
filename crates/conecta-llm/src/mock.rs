use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use conecta_core::errors::GatewayError;
use conecta_core::provider::{GenerateOptions, GenerateRequest, Generated, TextProvider};

/// Pre-programmed responses for deterministic testing without API calls.
pub enum MockResponse {
    /// Return the given text.
    Reply(String),
    /// Return an error from the generate() call itself.
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: create a plain text reply.
    pub fn reply(text: &str) -> Self {
        Self::Reply(text.to_string())
    }

    /// Convenience: create a reply carrying a JSON payload, for flows that
    /// request structured output.
    pub fn json(value: serde_json::Value) -> Self {
        Self::Reply(value.to_string())
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every request it sees.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        _options: &GenerateOptions,
    ) -> Result<Generated, GatewayError> {
        self.requests.lock().push(request.clone());
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        if idx >= self.responses.len() {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {}",
                idx
            )));
        }

        // SAFETY: We only access each index once due to atomic fetch_add.
        // The Vec is not mutated, we just need a shared reference.
        let response = unsafe {
            let ptr = self.responses.as_ptr().add(idx);
            &*ptr
        };

        resolve_response(response).await
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: &MockResponse) -> Result<Generated, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Reply(text) => {
                return Ok(Generated { text: text.clone() });
            }
            MockResponse::Error(e) => return Err(e.clone()),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(*duration).await;
                current = inner;
            }
        }
    }
}
