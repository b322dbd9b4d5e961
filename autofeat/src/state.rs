//! The shared mutable record threading through every stage.
//!
//! `PipelineState` is exclusively owned by the orchestrator and passed
//! by `&mut` into one stage at a time; there is no ambient or global
//! access. Each stage mutates only its designated fields.

use std::collections::BTreeMap;

use crate::compiler::CompileOutcome;
use crate::errors::AutofeatError;
use crate::eval::EvalReport;
use crate::frame::Frame;

/// Aggregate state of one featurization run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Name of the prediction column. Immutable after construction.
    pub target: String,
    /// Manuscript text fed to the Summarize stage. Immutable.
    pub manuscript: String,
    /// The original tabular data. Immutable.
    pub raw: Frame,
    /// Working copy of `raw`; columns are appended over time. Never
    /// loses the target column.
    pub augmented: Frame,
    /// Ordered column names currently eligible as model inputs
    /// (excludes the target).
    pub feature_keys: Vec<String>,
    /// Free-text literature summary, set once by Summarize.
    pub literature_review: Option<String>,
    /// Feature-name → physical-meaning text; set by Summarize,
    /// extended by Propose.
    pub features_description: BTreeMap<String, String>,
    /// New-feature-name → derivation-text for the *current* cycle;
    /// replaced, not merged, by each Propose.
    pub construct_strategy: BTreeMap<String, String>,
    /// Report from the most recent Evaluate.
    pub eval_report: Option<EvalReport>,
    /// Completed feedback-loop iterations.
    pub iteration: usize,
    /// Loop cap.
    pub max_iterations: usize,
    /// Append-only history of every evaluation report.
    pub datalog: Vec<EvalReport>,
    /// Append-only history of every construct strategy.
    pub featurelog: Vec<BTreeMap<String, String>>,
    /// Append-only history of each Generate stage's per-feature
    /// compilation outcomes.
    pub compilelog: Vec<BTreeMap<String, CompileOutcome>>,
}

impl PipelineState {
    /// Constructs the state from a target name, manuscript text, and a
    /// tabular source.
    ///
    /// # Errors
    ///
    /// Fails if the target column is absent from the frame.
    pub fn new(
        target: impl Into<String>,
        manuscript: impl Into<String>,
        frame: Frame,
        max_iterations: usize,
    ) -> Result<Self, AutofeatError> {
        let target = target.into();
        if !frame.has_column(&target) {
            return Err(AutofeatError::Frame(format!(
                "target column '{target}' not found in dataset (columns: {})",
                frame.names().join(", ")
            )));
        }
        let feature_keys = frame
            .names()
            .into_iter()
            .filter(|n| *n != target)
            .map(ToOwned::to_owned)
            .collect();

        Ok(Self {
            target,
            manuscript: manuscript.into(),
            augmented: frame.clone(),
            raw: frame,
            feature_keys,
            literature_review: None,
            features_description: BTreeMap::new(),
            construct_strategy: BTreeMap::new(),
            eval_report: None,
            iteration: 0,
            max_iterations,
            datalog: Vec::new(),
            featurelog: Vec::new(),
            compilelog: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Frame};
    use pretty_assertions::assert_eq;

    fn frame() -> Frame {
        Frame::from_columns(vec![
            Column::dense("A", &[1.0]),
            Column::dense("B", &[2.0]),
            Column::dense("y", &[3.0]),
        ])
        .unwrap()
    }

    #[test]
    fn construction_excludes_target_from_feature_keys() {
        let state = PipelineState::new("y", "paper", frame(), 3).unwrap();
        assert_eq!(state.feature_keys, vec!["A", "B"]);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.max_iterations, 3);
        assert!(state.augmented.has_column("y"));
        assert_eq!(state.raw, state.augmented);
    }

    #[test]
    fn construction_rejects_missing_target() {
        let err = PipelineState::new("nope", "paper", frame(), 1).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn logs_start_empty() {
        let state = PipelineState::new("y", "paper", frame(), 0).unwrap();
        assert!(state.datalog.is_empty());
        assert!(state.featurelog.is_empty());
        assert!(state.compilelog.is_empty());
        assert!(state.literature_review.is_none());
    }
}
