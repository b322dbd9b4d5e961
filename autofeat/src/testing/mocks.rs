//! Mock backend and evaluator for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::backend::{BackendError, ChatBackend, ChatMessage};
use crate::eval::{
    EvalReport, Evaluator, Metrics, Performance, RegressionMetrics, Task,
    rank_importance,
};
use crate::frame::Frame;

/// A backend that replays scripted replies in order and records calls.
///
/// When the script runs out, [`ScriptedBackend::repeating`] keeps
/// returning its fallback; a plain scripted backend fails fatally.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    fallback: Option<Result<String, BackendError>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    /// Creates a backend that replays `script` then fails fatally.
    #[must_use]
    pub fn new(script: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a backend that returns `reply` on every call.
    #[must_use]
    pub fn repeating(reply: Result<String, BackendError>) -> Self {
        Self::with_fallback(Vec::new(), reply)
    }

    /// Creates a backend that replays `script`, then repeats `fallback`.
    #[must_use]
    pub fn with_fallback(
        script: Vec<Result<String, BackendError>>,
        fallback: Result<String, BackendError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Some(fallback),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        let n = *self.call_count.lock().unwrap();
        n
    }

    /// Every request received, in order.
    #[must_use]
    pub fn recorded_requests(&self) -> Vec<Vec<ChatMessage>> {
        #[allow(clippy::unwrap_used)]
        let reqs = self.requests.lock().unwrap().clone();
        reqs
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        #[allow(clippy::unwrap_used)]
        {
            *self.call_count.lock().unwrap() += 1;
            self.requests.lock().unwrap().push(messages.to_vec());
        }
        #[allow(clippy::unwrap_used)]
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => self.fallback.clone().unwrap_or_else(|| {
                Err(BackendError::Fatal {
                    message: "scripted backend exhausted".to_string(),
                    status: None,
                })
            }),
        }
    }
}

/// Builds a minimal conforming regression report for fixtures.
#[must_use]
pub fn canned_report(feature_keys: &[String]) -> EvalReport {
    let importance = rank_importance(
        feature_keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), (feature_keys.len() - i) as f64))
            .collect(),
    );
    let metrics = |n_obs| {
        Metrics::Regression(RegressionMetrics {
            mse: 1.0,
            rmse: 1.0,
            r2: 0.5,
            n_obs,
        })
    };
    EvalReport {
        model_id: "fixed_00000000_0".to_string(),
        model_type: "fixed_regression".to_string(),
        performance: Performance {
            train: metrics(80),
            test: metrics(20),
        },
        feature_importance: importance,
        narrative: "fixed_regression achieved R²=0.500 on test data.".to_string(),
    }
}

/// An evaluator returning canned reports and recording each call's
/// feature keys.
#[derive(Debug, Default)]
pub struct FixedEvaluator {
    call_count: Mutex<usize>,
    seen_keys: Mutex<Vec<Vec<String>>>,
    fail_with: Option<String>,
}

impl FixedEvaluator {
    /// Creates an evaluator that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluator that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Number of evaluations performed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        let n = *self.call_count.lock().unwrap();
        n
    }

    /// Feature keys from each call, in order.
    #[must_use]
    pub fn seen_keys(&self) -> Vec<Vec<String>> {
        #[allow(clippy::unwrap_used)]
        let keys = self.seen_keys.lock().unwrap().clone();
        keys
    }
}

#[async_trait]
impl Evaluator for FixedEvaluator {
    async fn evaluate(
        &self,
        _frame: &Frame,
        feature_keys: &[String],
        _target: &str,
        _task: Task,
    ) -> Result<EvalReport, String> {
        #[allow(clippy::unwrap_used)]
        {
            *self.call_count.lock().unwrap() += 1;
            self.seen_keys.lock().unwrap().push(feature_keys.to_vec());
        }
        match &self.fail_with {
            Some(reason) => Err(reason.clone()),
            None => Ok(canned_report(feature_keys)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_backend_replays_in_order_then_fails() {
        let backend = ScriptedBackend::new(vec![
            Ok("one".to_string()),
            Ok("two".to_string()),
        ]);
        let msgs = [ChatMessage::user("hi")];

        assert_eq!(backend.complete(&msgs).await.unwrap(), "one");
        assert_eq!(backend.complete(&msgs).await.unwrap(), "two");
        assert!(backend.complete(&msgs).await.is_err());
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn fixed_evaluator_counts_calls() {
        let frame = Frame::new();
        let keys = vec!["a".to_string(), "b".to_string()];
        let eval = FixedEvaluator::new();

        let report = eval
            .evaluate(&frame, &keys, "y", Task::Regression)
            .await
            .unwrap();
        assert_eq!(eval.call_count(), 1);
        assert_eq!(report.top_feature(), Some("a"));
        assert_eq!(eval.seen_keys(), vec![keys]);
    }

    #[test]
    fn canned_report_percentages_sum_to_one() {
        let report = canned_report(&["x".to_string(), "y".to_string()]);
        let sum: f64 = report.feature_importance.iter().map(|f| f.percentage).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
