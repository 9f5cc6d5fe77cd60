//! # Mock Completion Model for Testing
//!
//! Provides a `MockCompletionModel` that implements the `CompletionModel` trait
//! for use in tests. It returns a scripted response or error and counts calls, so
//! summarization can be exercised without network access.

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    one_or_many::OneOrMany,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(OneOrMany<AssistantContent>),
    Fail(String),
}

/// A mock completion model for testing purposes.
///
/// Clones share the script and the call counter.
#[derive(Debug, Clone)]
pub struct MockCompletionModel {
    script: Arc<Mutex<Option<Scripted>>>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletionModel {
    /// Creates a new mock model that will return a default empty success response.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the response that the mock model should return.
    pub async fn set_response(&self, response: OneOrMany<AssistantContent>) {
        *self.script.lock().await = Some(Scripted::Reply(response));
    }

    /// Helper to create a simple text response.
    pub async fn set_text_response(&self, text: &str) {
        self.set_response(OneOrMany::one(AssistantContent::text(text)))
            .await;
    }

    /// Make every subsequent call fail with a provider error.
    pub async fn set_error(&self, message: &str) {
        *self.script.lock().await = Some(Scripted::Fail(message.to_string()));
    }

    /// Number of completion calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        _completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().await.clone();
        match script {
            Some(Scripted::Reply(choice)) => Ok(CompletionResponse {
                choice,
                raw_response: String::new(),
            }),
            Some(Scripted::Fail(message)) => Err(CompletionError::ProviderError(message)),
            None => Ok(CompletionResponse {
                choice: OneOrMany::one(AssistantContent::text("")),
                raw_response: String::new(),
            }),
        }
    }
}
