//! Error types for the autofeat pipeline.
//!
//! The taxonomy separates failures by blast radius: transient backend
//! faults and malformed replies are retryable inside the contract
//! caller; fatal backend faults propagate immediately; an exhausted
//! retry budget surfaces as [`AutofeatError::ContractUnsatisfied`] and
//! aborts the whole run. Per-feature compilation failures never reach
//! this enum at all; they are absorbed into the compiler's status map.

use thiserror::Error;

/// The main error type for autofeat operations.
#[derive(Debug, Error)]
pub enum AutofeatError {
    /// A retryable backend fault (timeout, 5xx-class status, recognized
    /// transient I/O pattern).
    #[error("transient backend error{}: {message}", fmt_status(*.status))]
    TransientBackend {
        /// Human-readable description from the backend client.
        message: String,
        /// HTTP-style status code, when the backend reported one.
        status: Option<u16>,
    },

    /// A non-retryable backend fault (auth, malformed request,
    /// 4xx-class status). Propagates without consuming retry budget.
    #[error("fatal backend error{}: {message}", fmt_status(*.status))]
    FatalBackend {
        /// Human-readable description from the backend client.
        message: String,
        /// HTTP-style status code, when the backend reported one.
        status: Option<u16>,
    },

    /// The backend reply did not parse into the expected schema, or
    /// parsed but failed the stage's validation predicate. Retryable.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A stage exhausted its retry budget. Terminal for the run.
    #[error("stage '{stage}' unsatisfied after {attempts} attempts")]
    ContractUnsatisfied {
        /// The stage whose contract could not be met.
        stage: String,
        /// Number of attempts consumed.
        attempts: usize,
        /// The last raw backend output, kept for diagnosis.
        last_output: Option<String>,
    },

    /// The evaluator failed after its own retries. Terminal for the run.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Invalid frame construction or a state-level precondition failure
    /// (e.g. the target column is absent from the dataset).
    #[error("frame error: {0}")]
    Frame(String),

    /// IO error from the convenience loader.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutofeatError {
    /// Creates a contract-unsatisfied error for a stage.
    #[must_use]
    pub fn contract_unsatisfied(
        stage: impl Into<String>,
        attempts: usize,
        last_output: Option<String>,
    ) -> Self {
        Self::ContractUnsatisfied {
            stage: stage.into(),
            attempts,
            last_output,
        }
    }

    /// Returns true if the error may succeed on a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientBackend { .. } | Self::SchemaViolation(_)
        )
    }
}

fn fmt_status(status: Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

/// Reason for a single feature failing to compile.
///
/// Deliberately not a variant of [`AutofeatError`]: feature failures
/// are isolated to their column and surfaced through the compiler's
/// status map, never through `Result` propagation across the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature '{feature}' failed to compile: {reason}")]
pub struct FeatureCompilationError {
    /// The feature name from the construct strategy.
    pub feature: String,
    /// Why the derivation could not be materialized.
    pub reason: String,
}

impl FeatureCompilationError {
    /// Creates a new per-feature compilation error.
    #[must_use]
    pub fn new(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_schema_errors_are_retryable() {
        let transient = AutofeatError::TransientBackend {
            message: "gateway timeout".to_string(),
            status: Some(504),
        };
        assert!(transient.is_retryable());

        let schema = AutofeatError::SchemaViolation("missing key".to_string());
        assert!(schema.is_retryable());
    }

    #[test]
    fn fatal_and_terminal_errors_are_not_retryable() {
        let fatal = AutofeatError::FatalBackend {
            message: "unauthorized".to_string(),
            status: Some(401),
        };
        assert!(!fatal.is_retryable());

        let unsatisfied = AutofeatError::contract_unsatisfied("Propose", 5, None);
        assert!(!unsatisfied.is_retryable());
    }

    #[test]
    fn contract_unsatisfied_carries_diagnostics() {
        let err = AutofeatError::contract_unsatisfied(
            "Summarize",
            3,
            Some("not json".to_string()),
        );
        match err {
            AutofeatError::ContractUnsatisfied {
                stage,
                attempts,
                last_output,
            } => {
                assert_eq!(stage, "Summarize");
                assert_eq!(attempts, 3);
                assert_eq!(last_output.as_deref(), Some("not json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_is_rendered_in_messages() {
        let err = AutofeatError::FatalBackend {
            message: "bad request".to_string(),
            status: Some(400),
        };
        assert!(err.to_string().contains("status 400"));
    }

    #[test]
    fn feature_error_display() {
        let err = FeatureCompilationError::new("sum_ab", "unknown column 'Z'");
        assert_eq!(
            err.to_string(),
            "feature 'sum_ab' failed to compile: unknown column 'Z'"
        );
    }
}
