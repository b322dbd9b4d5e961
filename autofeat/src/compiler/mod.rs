//! Fault-isolating feature compiler.
//!
//! Turns a construct strategy (feature-name → derivation-text) into
//! dataset columns. Features compile independently: a failure on one
//! materializes as an all-missing column plus a recorded reason, and
//! never prevents or corrupts a sibling's column.

mod expr;
mod resolver;

pub use expr::{BinOp, Expr, Reducer};
pub use resolver::{BackendResolver, RuleResolver, TransformResolver};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::FeatureCompilationError;
use crate::frame::{Column, Frame};

/// Outcome of compiling one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The column was materialized and registered as a model input.
    Success,
    /// The column is present but entirely missing; the reason records
    /// why the derivation could not be executed.
    Failed(FeatureCompilationError),
}

impl CompileOutcome {
    /// Returns true for the success case.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Compiles construct strategies into frame columns.
pub struct FeatureCompiler {
    resolver: Arc<dyn TransformResolver>,
}

impl FeatureCompiler {
    /// Creates a compiler over the given resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn TransformResolver>) -> Self {
        Self { resolver }
    }

    /// Compiles every entry of `strategy` against `frame`.
    ///
    /// Successful features append (or replace) their column and are
    /// added to `feature_keys`; a failed feature with a new name still
    /// appends an all-missing column so the strategy key is reflected
    /// in the frame, while a failed feature naming an existing column
    /// leaves that column's data intact. The `target` column can never
    /// be overwritten. Returns the per-feature status map.
    pub async fn compile(
        &self,
        strategy: &BTreeMap<String, String>,
        frame: &mut Frame,
        feature_keys: &mut Vec<String>,
        target: &str,
    ) -> BTreeMap<String, CompileOutcome> {
        let mut statuses = BTreeMap::new();

        for (name, derivation) in strategy {
            let outcome = self
                .compile_one(name, derivation, frame, feature_keys, target)
                .await;
            match &outcome {
                CompileOutcome::Success => {
                    tracing::info!(feature = %name, "feature compiled");
                }
                CompileOutcome::Failed(err) => {
                    tracing::warn!(feature = %name, reason = %err.reason, "feature failed to compile");
                }
            }
            statuses.insert(name.clone(), outcome);
        }

        statuses
    }

    async fn compile_one(
        &self,
        name: &str,
        derivation: &str,
        frame: &mut Frame,
        feature_keys: &mut Vec<String>,
        target: &str,
    ) -> CompileOutcome {
        if name == target {
            let err = FeatureCompilationError::new(
                name,
                "refusing to overwrite the target column".to_string(),
            );
            return CompileOutcome::Failed(err);
        }

        let result = match self.resolver.resolve(name, derivation, frame).await {
            Ok(expr) => expr.materialize(frame),
            Err(reason) => Err(reason),
        };

        match result {
            Ok(values) => {
                let column = Column::new(name, values);
                if let Err(e) = frame.insert_column(column) {
                    return CompileOutcome::Failed(FeatureCompilationError::new(
                        name,
                        e.to_string(),
                    ));
                }
                if !feature_keys.iter().any(|k| k == name) {
                    feature_keys.push(name.to_string());
                }
                CompileOutcome::Success
            }
            Err(reason) => {
                // Materialize a new name as an entirely missing column
                // so the strategy key is still reflected in the frame.
                // A pre-existing column keeps its data untouched.
                if !frame.has_column(name) {
                    let missing = Column::new(name, vec![None; frame.n_rows()]);
                    // Length always matches the frame, so this cannot fail.
                    let _ = frame.insert_column(missing);
                }
                CompileOutcome::Failed(FeatureCompilationError::new(name, reason))
            }
        }
    }
}
