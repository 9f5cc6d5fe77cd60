//! # LLM Client Module
//!
//! This module wires the completion model that backs page summarization, with
//! built-in rate limiting to prevent API quota exhaustion.
//!
//! ## Key Components
//!
//! - `Client`: Holds the (rate-limited) completion model
//! - `RateLimitedCompletionModel`: A wrapper that adds rate limiting to any completion model
//! - `MockCompletionModel`: A scripted model for tests
//!
//! The API key is read from `GEMINI_API_KEY`; a missing key is a configuration
//! error, not a panic.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use ratelimited_completion::RateLimitedCompletionModel;
use rig::{completion::CompletionModel, providers::gemini};

use crate::error::{Error, Result};

pub mod mock_model;
pub mod ratelimited_completion;

/// Completion model used for summaries
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default request quota for the summarization model
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 2000;

#[derive(Debug, Clone)]
pub struct Client<C>
where
    C: CompletionModel,
{
    completion_model: C,
}

/// Raw provider response carried through the rate-limited wrapper
pub struct RateLimitResponse<T> {
    #[allow(dead_code)]
    response: T,
}

/// A direct governor limiter admitting `requests_per_minute` calls
pub(crate) fn per_minute_limiter(requests_per_minute: u32) -> governor::DefaultDirectRateLimiter {
    let quota = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_minute(quota))
}

impl Client<RateLimitedCompletionModel<gemini::completion::CompletionModel>> {
    pub fn new_gemini_from_env() -> Result<Self> {
        let gemini_api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            Error::Config("GEMINI_API_KEY environment variable must be set".to_string())
        })?;
        let gemini_client = gemini::Client::new(&gemini_api_key);
        Ok(Self::new_gemini(gemini_client, DEFAULT_REQUESTS_PER_MINUTE))
    }

    pub fn new_gemini(gemini_client: gemini::Client, requests_per_minute: u32) -> Self {
        let completion_model = RateLimitedCompletionModel::new(
            gemini_client.completion_model(GEMINI_MODEL),
            per_minute_limiter(requests_per_minute),
        );
        Self { completion_model }
    }
}

impl<C> Client<C>
where
    C: CompletionModel,
{
    pub fn new(completion_model: C) -> Self {
        Self { completion_model }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn into_completion(self) -> C {
        self.completion_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_model::MockCompletionModel;

    #[test]
    fn test_missing_key_is_config_error() {
        // SAFETY: tests in this module do not read the variable concurrently.
        unsafe { std::env::remove_var("GEMINI_API_KEY") };
        let result = Client::new_gemini_from_env();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let limiter = per_minute_limiter(0);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_client_wraps_any_model() {
        let client = Client::new(MockCompletionModel::new());
        assert_eq!(client.completion().call_count(), 0);
    }
}
