//! High-level entry point wiring inputs into a configured pipeline run.
//!
//! [`AutoFeaturizer`] gathers the manuscript, the dataset, and the loop
//! configuration, then builds the orchestrator and runs it to
//! completion, returning the final [`PipelineState`] with its
//! accumulated logs.

use std::path::Path;
use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::compiler::TransformResolver;
use crate::contract::RetryConfig;
use crate::errors::AutofeatError;
use crate::eval::{Evaluator, Task};
use crate::frame::Frame;
use crate::loader;
use crate::pipeline::Orchestrator;
use crate::state::PipelineState;

/// Builder for a full featurization run.
#[derive(Clone)]
pub struct AutoFeaturizer {
    target: String,
    manuscript: String,
    frame: Frame,
    max_iterations: usize,
    task: Task,
    retry: RetryConfig,
    resolver: Option<Arc<dyn TransformResolver>>,
}

impl std::fmt::Debug for AutoFeaturizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoFeaturizer")
            .field("target", &self.target)
            .field("max_iterations", &self.max_iterations)
            .field("task", &self.task)
            .field("retry", &self.retry)
            .field("custom_resolver", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl AutoFeaturizer {
    /// Builds a run from a manuscript file and a CSV dataset on disk.
    pub fn from_paths(
        manuscript_path: impl AsRef<Path>,
        csv_path: impl AsRef<Path>,
        target: impl Into<String>,
        max_iterations: usize,
    ) -> Result<Self, AutofeatError> {
        let manuscript = loader::load_manuscript(manuscript_path)?;
        let frame = loader::load_csv(csv_path)?;
        Self::from_parts(manuscript, frame, target, max_iterations)
    }

    /// Builds a run from already-loaded inputs.
    ///
    /// Fails if the target column is not present in the dataset.
    pub fn from_parts(
        manuscript: impl Into<String>,
        frame: Frame,
        target: impl Into<String>,
        max_iterations: usize,
    ) -> Result<Self, AutofeatError> {
        let target = target.into();
        if !frame.has_column(&target) {
            return Err(AutofeatError::Frame(format!(
                "target column '{target}' not found in dataset"
            )));
        }
        Ok(Self {
            target,
            manuscript: manuscript.into(),
            frame,
            max_iterations,
            task: Task::Regression,
            retry: RetryConfig::new(),
            resolver: None,
        })
    }

    /// Sets the modelling task (regression by default).
    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Sets the retry policy used by every backend contract.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the derivation resolver used by the feature compiler.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn TransformResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Runs the pipeline to completion and returns the final state.
    pub async fn run(
        self,
        backend: Arc<dyn ChatBackend>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Result<PipelineState, AutofeatError> {
        let mut state = PipelineState::new(
            self.target,
            self.manuscript,
            self.frame,
            self.max_iterations,
        )?;
        let mut orchestrator = Orchestrator::new(backend, evaluator)
            .with_task(self.task)
            .with_retry(self.retry);
        if let Some(resolver) = self.resolver {
            orchestrator = orchestrator.with_resolver(resolver);
        }
        orchestrator.run(&mut state).await?;
        Ok(state)
    }
}

/// Installs a process-wide tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleResolver;
    use crate::frame::Column;
    use crate::testing::{FixedEvaluator, ScriptedBackend};
    use pretty_assertions::assert_eq;

    fn frame() -> Frame {
        Frame::from_columns(vec![
            Column::dense("A", &[1.0, 2.0, 3.0]),
            Column::dense("y", &[2.0, 4.0, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn debug_output_elides_the_resolver() {
        let featurizer = AutoFeaturizer::from_parts("paper", frame(), "y", 1).unwrap();
        let rendered = format!("{featurizer:?}");
        assert!(rendered.contains("target: \"y\""));
        assert!(rendered.contains("custom_resolver: false"));
    }

    #[test]
    fn from_parts_rejects_missing_target() {
        let err = AutoFeaturizer::from_parts("paper", frame(), "absent", 1).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[tokio::test]
    async fn run_returns_final_state_with_logs() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(r#"{
            "manuscript_summary": "A drives y.",
            "column_key": {"A": "input", "y": "outcome"}
        }"#
        .to_string())]));
        let evaluator = Arc::new(FixedEvaluator::new());

        let state = AutoFeaturizer::from_parts("paper", frame(), "y", 0)
            .unwrap()
            .with_retry(RetryConfig::new().with_max_attempts(2).with_base_delay_ms(1))
            .with_resolver(Arc::new(RuleResolver::new()))
            .run(backend, evaluator.clone())
            .await
            .unwrap();

        assert_eq!(state.datalog.len(), 1);
        assert_eq!(evaluator.call_count(), 1);
        assert_eq!(state.literature_review.as_deref(), Some("A drives y."));
    }
}
