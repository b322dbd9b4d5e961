//! Contract-validated backend calls with bounded retry.
//!
//! Every stage talks to the generative backend through
//! [`ContractCaller::call`]: one code path owns JSON extraction, schema
//! parsing, predicate validation, transient-vs-fatal classification,
//! and exponential backoff, so stages never reimplement ad hoc retry
//! loops. On success a stage observes only data that already passed its
//! schema predicate.

mod schemas;

pub use schemas::{FormulaReply, ProposeReply, SummarizeReply};

use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::backend::{ChatBackend, ChatMessage};
use crate::errors::AutofeatError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum attempts, including the initial call.
    pub max_attempts: usize,
    /// Base delay in milliseconds; attempt `n` waits `base * 2^n`.
    pub base_delay_ms: u64,
    /// Cap on any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Delay for a 0-indexed attempt: `base * 2^attempt`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX)));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Bounded-retry wrapper around a backend call plus an output validator.
#[derive(Debug, Clone, Default)]
pub struct ContractCaller {
    config: RetryConfig,
}

impl ContractCaller {
    /// Creates a caller with the given retry config.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the retry config.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Invokes the backend until the reply parses into `T` and passes
    /// `validate`, retrying transient faults and malformed output with
    /// exponential backoff.
    ///
    /// Fatal backend errors propagate immediately without consuming the
    /// retry budget. Exhausting all attempts returns
    /// [`AutofeatError::ContractUnsatisfied`] carrying the last raw
    /// reply.
    pub async fn call<T, V>(
        &self,
        stage: &str,
        backend: &dyn ChatBackend,
        messages: &[ChatMessage],
        validate: V,
    ) -> Result<T, AutofeatError>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), String>,
    {
        let mut last_output: Option<String> = None;

        for attempt in 0..self.config.max_attempts {
            let raw = match backend.complete(messages).await {
                Ok(raw) => raw,
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        stage,
                        attempt,
                        error = %err,
                        "transient backend error, backing off"
                    );
                    self.backoff(attempt).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            last_output = Some(raw.clone());
            match parse_validated(&raw, &validate) {
                Ok(parsed) => {
                    tracing::debug!(stage, attempt, "contract satisfied");
                    return Ok(parsed);
                }
                Err(reason) => {
                    tracing::warn!(
                        stage,
                        attempt,
                        %reason,
                        "reply violated contract, backing off"
                    );
                    self.backoff(attempt).await;
                }
            }
        }

        Err(AutofeatError::contract_unsatisfied(
            stage,
            self.config.max_attempts,
            last_output,
        ))
    }

    async fn backoff(&self, attempt: usize) {
        // No delay after the final attempt; the caller is about to
        // return anyway.
        if attempt + 1 < self.config.max_attempts {
            tokio::time::sleep(self.config.delay_for(attempt)).await;
        }
    }
}

fn parse_validated<T, V>(raw: &str, validate: &V) -> Result<T, String>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), String>,
{
    let json = extract_json_object(raw)
        .ok_or_else(|| "no JSON object found in reply".to_string())?;
    let parsed: T =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;
    validate(&parsed)?;
    Ok(parsed)
}

/// Extracts the outermost JSON object from a raw reply, tolerating
/// surrounding prose and markdown code fences.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        answer: String,
    }

    fn always_valid(_: &Reply) -> Result<(), String> {
        Ok(())
    }

    fn fast_caller(max_attempts: usize) -> ContractCaller {
        ContractCaller::new(
            RetryConfig::new()
                .with_max_attempts(max_attempts)
                .with_base_delay_ms(1),
        )
    }

    #[test]
    fn delay_doubles_per_attempt_and_caps() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_max_delay_ms(350);
        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(350));
    }

    #[test]
    fn extract_json_tolerates_fences_and_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"answer\": \"42\"}\n```\n";
        assert_eq!(extract_json_object(raw), Some("{\"answer\": \"42\"}"));
        assert_eq!(extract_json_object("no braces here"), None);
    }

    #[tokio::test]
    async fn valid_reply_returns_on_first_attempt() {
        let backend = ScriptedBackend::new(vec![Ok("{\"answer\": \"yes\"}".to_string())]);
        let caller = fast_caller(3);

        let reply: Reply = caller
            .call("Test", &backend, &[ChatMessage::user("hi")], always_valid)
            .await
            .unwrap();

        assert_eq!(reply.answer, "yes");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_then_valid_returns_parsed_result() {
        let backend = ScriptedBackend::new(vec![
            Ok("not json at all".to_string()),
            Ok("{\"wrong_key\": 1}".to_string()),
            Ok("{\"answer\": \"eventually\"}".to_string()),
        ]);
        let caller = fast_caller(5);

        let reply: Reply = caller
            .call("Test", &backend, &[ChatMessage::user("hi")], always_valid)
            .await
            .unwrap();

        assert_eq!(reply.answer, "eventually");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_raises_contract_unsatisfied_with_last_output() {
        let backend = ScriptedBackend::repeating(Ok("garbage".to_string()));
        let caller = fast_caller(3);

        let err = caller
            .call::<Reply, _>("Propose", &backend, &[ChatMessage::user("hi")], always_valid)
            .await
            .unwrap_err();

        match err {
            AutofeatError::ContractUnsatisfied {
                stage,
                attempts,
                last_output,
            } => {
                assert_eq!(stage, "Propose");
                assert_eq!(attempts, 3);
                assert_eq!(last_output.as_deref(), Some("garbage"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn predicate_failure_consumes_attempts() {
        let backend =
            ScriptedBackend::repeating(Ok("{\"answer\": \"short\"}".to_string()));
        let caller = fast_caller(2);

        let err = caller
            .call::<Reply, _>("Test", &backend, &[ChatMessage::user("hi")], |r| {
                if r.answer.len() > 10 {
                    Ok(())
                } else {
                    Err("answer too short".to_string())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AutofeatError::ContractUnsatisfied { .. }));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn transient_errors_retry_then_succeed() {
        let backend = ScriptedBackend::new(vec![
            Err(crate::backend::BackendError::classify("gateway error", Some(502))),
            Err(crate::backend::BackendError::classify("timed out", None)),
            Ok("{\"answer\": \"recovered\"}".to_string()),
        ]);
        let caller = fast_caller(5);

        let reply: Reply = caller
            .call("Test", &backend, &[ChatMessage::user("hi")], always_valid)
            .await
            .unwrap();

        assert_eq!(reply.answer, "recovered");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn fatal_error_propagates_without_retries() {
        let backend = ScriptedBackend::repeating(Err(
            crate::backend::BackendError::classify("invalid api key", Some(401)),
        ));
        let caller = fast_caller(5);

        let err = caller
            .call::<Reply, _>("Test", &backend, &[ChatMessage::user("hi")], always_valid)
            .await
            .unwrap_err();

        assert!(matches!(err, AutofeatError::FatalBackend { .. }));
        assert_eq!(backend.call_count(), 1);
    }
}
