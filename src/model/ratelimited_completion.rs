use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use rig::{
    agent::AgentBuilder,
    completion::{self, CompletionError, CompletionModel, CompletionRequest, CompletionResponse},
};
use tracing::{Instrument, debug_span, info_span};

use super::{RateLimitResponse, per_minute_limiter};

/// Completion model that waits on a shared quota before every request.
///
/// Clones share one limiter, so concurrent summaries draw from the same budget.
#[derive(Clone)]
pub struct RateLimitedCompletionModel<M: CompletionModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<M> RateLimitedCompletionModel<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
        }
    }

    pub fn per_minute(model: M, requests_per_minute: u32) -> Self {
        Self::new(model, per_minute_limiter(requests_per_minute))
    }

    pub fn inner(&self) -> &M {
        &self.model
    }

    pub fn agent(self) -> AgentBuilder<Self> {
        AgentBuilder::new(self)
    }
}

impl<M: CompletionModel> CompletionModel for RateLimitedCompletionModel<M> {
    type Response = RateLimitResponse<M::Response>;

    async fn completion(
        &self,
        completion_request: CompletionRequest,
    ) -> Result<completion::CompletionResponse<Self::Response>, CompletionError> {
        self.limiter
            .until_ready()
            .instrument(debug_span!("summary_quota"))
            .await;
        let response = self
            .model
            .completion(completion_request)
            .instrument(info_span!("completion"))
            .await;
        response.map(|response| CompletionResponse {
            choice: response.choice,
            raw_response: RateLimitResponse {
                response: response.raw_response,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::MockCompletionModel;
    use rig::completion::Prompt;

    #[tokio::test]
    async fn test_requests_pass_through_the_limiter() {
        let mock = MockCompletionModel::new();
        mock.set_text_response("Acme GmbH builds machines.").await;

        let limited = RateLimitedCompletionModel::per_minute(mock.clone(), 60);
        let agent = limited.agent().preamble("Summarize.").build();

        let answer = agent.prompt("Acme GmbH Impressum").await.unwrap();
        assert_eq!(answer, "Acme GmbH builds machines.");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_propagated() {
        let mock = MockCompletionModel::new();
        mock.set_error("quota exceeded").await;

        let limited = RateLimitedCompletionModel::per_minute(mock, 60);
        let agent = limited.agent().build();

        assert!(agent.prompt("text").await.is_err());
    }
}
