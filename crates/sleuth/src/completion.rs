use std::time::Duration;

use rand::Rng;

use crate::errors::CompletionFailure;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Completion, Provider, ToolChoice};

/// Randomized exponential backoff with a fixed attempt budget.
///
/// Before retry `n` (1-based) the client sleeps for a uniformly random duration in
/// `[0, min(max_wait, multiplier * 2^(n-1))]`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            max_wait: Duration::from_secs(40),
        }
    }
}

impl RetryPolicy {
    /// Retry without sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    pub fn max_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.multiplier
            .saturating_mul(1u32 << exponent)
            .min(self.max_wait)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.max_delay_for(attempt);
        if cap.is_zero() {
            return cap;
        }
        let secs = rand::thread_rng().gen_range(0.0..=cap.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Wraps a provider with the retry policy. Every completion the agent makes goes
/// through here, including extraction and summary requests.
pub struct CompletionClient {
    provider: Box<dyn Provider>,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn request_completion(
        &self,
        messages: &[Message],
        tool_choice: ToolChoice,
        tools: &[Tool],
    ) -> Result<Completion, CompletionFailure> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.complete(messages, tools, tool_choice).await {
                Ok(completion) => return Ok(completion),
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(attempt, error = %e, "Unable to generate chat completion");
                    return Err(CompletionFailure {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Send a single user prompt without tools and return the reply text
    pub async fn complete_text(&self, prompt: &str) -> Result<String, CompletionFailure> {
        let messages = [Message::user().with_text(prompt)];
        let completion = self
            .request_completion(&messages, ToolChoice::None, &[])
            .await?;
        Ok(completion.message.text().unwrap_or_default())
    }
}
