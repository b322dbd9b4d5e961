//! Generate stage: compile the current construct strategy into
//! dataset columns.

use std::collections::BTreeMap;

use crate::compiler::{CompileOutcome, FeatureCompiler};
use crate::errors::AutofeatError;
use crate::state::PipelineState;

/// Runs the Generate stage once, returning the per-feature status map.
///
/// Feature failures are absorbed here: the run continues regardless of
/// how many features failed, and the status map is appended to the
/// state's compile log so callers can inspect it after the run.
pub async fn run(
    state: &mut PipelineState,
    compiler: &FeatureCompiler,
) -> Result<BTreeMap<String, CompileOutcome>, AutofeatError> {
    let statuses = compiler
        .compile(
            &state.construct_strategy,
            &mut state.augmented,
            &mut state.feature_keys,
            &state.target,
        )
        .await;

    let failed = statuses.values().filter(|s| !s.is_success()).count();
    tracing::info!(
        compiled = statuses.len() - failed,
        failed,
        "feature generation complete"
    );

    state.compilelog.push(statuses.clone());
    Ok(statuses)
}
