//! Evaluate stage: train a model on the current features and record
//! its report.

use crate::errors::AutofeatError;
use crate::eval::{Evaluator, Task};
use crate::state::PipelineState;

/// Runs the Evaluate stage once.
///
/// On success `eval_report` is set and the report is appended to the
/// datalog. An evaluator failure is fatal for the run: downstream
/// proposals depend on a report existing.
pub async fn run(
    state: &mut PipelineState,
    evaluator: &dyn Evaluator,
    task: Task,
) -> Result<(), AutofeatError> {
    let report = evaluator
        .evaluate(&state.augmented, &state.feature_keys, &state.target, task)
        .await
        .map_err(|reason| AutofeatError::Evaluation(format!("Evaluate stage: {reason}")))?;

    tracing::info!(
        model = %report.model_type,
        top_feature = report.top_feature().unwrap_or("(none)"),
        "evaluation complete"
    );

    state.datalog.push(report.clone());
    state.eval_report = Some(report);
    Ok(())
}
