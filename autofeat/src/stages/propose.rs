//! Propose stage: feature descriptions + last report → new derivations.

use crate::backend::{ChatBackend, ChatMessage};
use crate::contract::{ContractCaller, ProposeReply};
use crate::errors::AutofeatError;
use crate::state::PipelineState;

/// Runs the Propose stage once.
///
/// On success the current cycle's `construct_strategy` is replaced
/// (not merged), the new significance texts extend
/// `features_description`, and the strategy is appended to the
/// feature log.
pub async fn run(
    state: &mut PipelineState,
    backend: &dyn ChatBackend,
    caller: &ContractCaller,
) -> Result<(), AutofeatError> {
    let messages = build_prompt(state);
    let reply: ProposeReply = caller
        .call("Propose", backend, &messages, ProposeReply::validate)
        .await?;

    tracing::info!(
        proposed = reply.new_feature_computation.len(),
        "features proposed"
    );

    state.construct_strategy = reply.new_feature_computation;
    state
        .features_description
        .extend(reply.new_feature_significance);
    state.featurelog.push(state.construct_strategy.clone());
    Ok(())
}

fn build_prompt(state: &PipelineState) -> Vec<ChatMessage> {
    let system = concat!(
        "You are a scientific feature engineering assistant.\n\n",
        "Task: propose new features to create from existing features, ",
        "using the given feature descriptions, literature summary, target ",
        "definition, and previous run reports.\n\n",
        "Output format (STRICT JSON):\n",
        "{\n",
        "  \"new_feature_significance\": {\"feature_name\": \"description of physical meaning\", ...},\n",
        "  \"new_feature_computation\": {\"feature_name\": \"how to derive it from existing features\", ...}\n",
        "}\n",
    );

    let report = state.eval_report.as_ref().map_or_else(
        || "(no previous run)".to_string(),
        |r| serde_json::to_string_pretty(r).unwrap_or_else(|_| r.narrative.clone()),
    );
    let descriptions = serde_json::to_string_pretty(&state.features_description)
        .unwrap_or_default();
    let user = format!(
        "==== Existing Features ====\n{descriptions}\n\
         ==== Literature Summary ====\n{}\n\
         ==== Target Specification ====\n{}\n\
         ==== Previous Runs Report ====\n{report}\n",
        state.literature_review.as_deref().unwrap_or("(none)"),
        state.target,
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
