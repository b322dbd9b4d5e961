//! Summarize stage: manuscript + data preview → literature review and
//! column descriptions.

use crate::backend::{ChatBackend, ChatMessage};
use crate::contract::{ContractCaller, SummarizeReply};
use crate::errors::AutofeatError;
use crate::state::PipelineState;

/// Rows of the dataset shown to the backend alongside the manuscript.
const PREVIEW_ROWS: usize = 5;

/// Runs the Summarize stage once.
///
/// On success sets `literature_review` and `features_description`
/// together; on failure neither field is written.
pub async fn run(
    state: &mut PipelineState,
    backend: &dyn ChatBackend,
    caller: &ContractCaller,
) -> Result<(), AutofeatError> {
    let messages = build_prompt(state);
    let reply: SummarizeReply = caller
        .call("Summarize", backend, &messages, SummarizeReply::validate)
        .await?;

    tracing::info!(
        columns = reply.column_key.len(),
        "manuscript summarized"
    );

    state.literature_review = Some(reply.manuscript_summary);
    state.features_description = reply.column_key;
    Ok(())
}

fn build_prompt(state: &PipelineState) -> Vec<ChatMessage> {
    let system = concat!(
        "You are tasked with understanding and summarizing a scientific ",
        "text with particular attention to the use of the data for ",
        "development of machine learning models.\n\n",
        "Output format (STRICT JSON):\n",
        "{\n",
        "  \"manuscript_summary\": \"<generated summary>\",\n",
        "  \"column_key\": {\"<column name>\": \"<physical interpretation and notes>\", ...},\n",
        "  \"notes\": \"<any context worth relaying>\"\n",
        "}\n",
    );
    let user = format!(
        "==== Manuscript text ====\n{}\n==== Data ====\n{}\n",
        state.manuscript,
        state.raw.preview(PREVIEW_ROWS),
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RetryConfig;
    use crate::frame::{Column, Frame};
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;

    fn state() -> PipelineState {
        let frame = Frame::from_columns(vec![
            Column::dense("A", &[1.0, 2.0]),
            Column::dense("B", &[3.0, 4.0]),
            Column::dense("y", &[5.0, 6.0]),
        ])
        .unwrap();
        PipelineState::new("y", "A manuscript about alloys.", frame, 1).unwrap()
    }

    fn caller() -> ContractCaller {
        ContractCaller::new(RetryConfig::new().with_max_attempts(2).with_base_delay_ms(1))
    }

    #[tokio::test]
    async fn commits_review_and_descriptions_together() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "manuscript_summary": "Alloys were studied.",
            "column_key": {"A": "first input", "B": "second input"},
            "notes": "none"
        }"#
        .to_string())]);
        let mut state = state();

        run(&mut state, &backend, &caller()).await.unwrap();

        assert_eq!(
            state.literature_review.as_deref(),
            Some("Alloys were studied.")
        );
        assert_eq!(state.features_description.len(), 2);
        assert_eq!(
            state.features_description.get("A").map(String::as_str),
            Some("first input")
        );
    }

    #[tokio::test]
    async fn prompt_embeds_manuscript_and_preview() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "manuscript_summary": "s",
            "column_key": {"A": "a", "B": "b"},
            "notes": ""
        }"#
        .to_string())]);
        let mut state = state();

        run(&mut state, &backend, &caller()).await.unwrap();

        let requests = backend.recorded_requests();
        let user = &requests[0][1].content;
        assert!(user.contains("A manuscript about alloys."));
        assert!(user.contains("A,B,y"));
    }

    #[tokio::test]
    async fn failed_contract_leaves_state_untouched() {
        let backend = ScriptedBackend::repeating(Ok("not json".to_string()));
        let mut state = state();

        let err = run(&mut state, &backend, &caller()).await.unwrap_err();

        assert!(matches!(err, AutofeatError::ContractUnsatisfied { .. }));
        assert!(state.literature_review.is_none());
        assert!(state.features_description.is_empty());
    }

    #[tokio::test]
    async fn single_column_key_violates_contract() {
        let backend = ScriptedBackend::repeating(Ok(r#"{
            "manuscript_summary": "s",
            "column_key": {"A": "only one"},
            "notes": ""
        }"#
        .to_string()));
        let mut state = state();

        let err = run(&mut state, &backend, &caller()).await.unwrap_err();
        assert!(matches!(err, AutofeatError::ContractUnsatisfied { .. }));
    }
}
