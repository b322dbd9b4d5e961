//! The stage orchestrator.
//!
//! Transition table:
//!
//! | from       | to                 | condition                              |
//! |------------|--------------------|----------------------------------------|
//! | Summarize  | Evaluate           | unconditional, runs once               |
//! | Evaluate   | Propose / Done     | increment iteration; Done past the cap |
//! | Propose    | Generate           | unconditional                          |
//! | Generate   | Evaluate           | unconditional (closes the loop)        |
//!
//! Stages execute strictly sequentially against the exclusively owned
//! `PipelineState`; a stage-level contract failure aborts the run.

use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::compiler::{BackendResolver, FeatureCompiler, TransformResolver};
use crate::contract::{ContractCaller, RetryConfig};
use crate::errors::AutofeatError;
use crate::eval::{Evaluator, Task};
use crate::stages::{self, StageKind};
use crate::state::PipelineState;

/// Computes the next stage, applying the Evaluate-exit iteration
/// increment.
pub fn next_stage(current: StageKind, state: &mut PipelineState) -> StageKind {
    match current {
        StageKind::Summarize => StageKind::Evaluate,
        StageKind::Evaluate => {
            state.iteration += 1;
            if state.iteration <= state.max_iterations {
                StageKind::Propose
            } else {
                StageKind::Done
            }
        }
        StageKind::Propose => StageKind::Generate,
        StageKind::Generate => StageKind::Evaluate,
        StageKind::Done => StageKind::Done,
    }
}

/// Drives a `PipelineState` from `Summarize` to `Done`.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    evaluator: Arc<dyn Evaluator>,
    compiler: FeatureCompiler,
    caller: ContractCaller,
    task: Task,
}

impl Orchestrator {
    /// Creates an orchestrator with the default retry config, a
    /// backend-backed transform resolver, and a regression task.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, evaluator: Arc<dyn Evaluator>) -> Self {
        let caller = ContractCaller::new(RetryConfig::default());
        let resolver = BackendResolver::new(backend.clone(), caller.clone());
        Self {
            backend,
            evaluator,
            compiler: FeatureCompiler::new(Arc::new(resolver)),
            caller,
            task: Task::Regression,
        }
    }

    /// Sets the prediction task.
    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Sets the retry config for every contract-validated call.
    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.caller = ContractCaller::new(config.clone());
        let resolver = BackendResolver::new(self.backend.clone(), self.caller.clone());
        self.compiler = FeatureCompiler::new(Arc::new(resolver));
        self
    }

    /// Replaces the transform resolver used by the feature compiler.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn TransformResolver>) -> Self {
        self.compiler = FeatureCompiler::new(resolver);
        self
    }

    /// Runs the state machine to `Done`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure: a stage whose contract could
    /// not be satisfied within its retry budget, a fatal backend
    /// error, or an evaluator failure.
    pub async fn run(&self, state: &mut PipelineState) -> Result<(), AutofeatError> {
        let mut stage = StageKind::Summarize;

        while stage != StageKind::Done {
            tracing::info!(%stage, iteration = state.iteration, "stage started");
            match stage {
                StageKind::Summarize => {
                    stages::summarize::run(state, self.backend.as_ref(), &self.caller)
                        .await?;
                }
                StageKind::Evaluate => {
                    stages::evaluate::run(state, self.evaluator.as_ref(), self.task)
                        .await?;
                }
                StageKind::Propose => {
                    stages::propose::run(state, self.backend.as_ref(), &self.caller)
                        .await?;
                }
                StageKind::Generate => {
                    stages::generate::run(state, &self.compiler).await?;
                }
                StageKind::Done => break,
            }
            stage = next_stage(stage, state);
        }

        tracing::info!(
            iterations = state.iteration,
            features = state.feature_keys.len(),
            "run complete"
        );
        Ok(())
    }
}
