//! Stage implementations for the featurization loop.
//!
//! Each stage is a free async function over `&mut PipelineState` plus
//! its external collaborators. A stage computes everything fallible
//! first and only then writes its designated fields, so a failure
//! leaves the state untouched.

pub mod evaluate;
pub mod generate;
pub mod propose;
pub mod summarize;

use serde::{Deserialize, Serialize};

/// Named states of the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    /// Review manuscript and data, seed feature descriptions.
    Summarize,
    /// Train and score a model on the current features.
    Evaluate,
    /// Ask the backend for new feature derivations.
    Propose,
    /// Compile the proposed derivations into columns.
    Generate,
    /// Terminal state.
    Done,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Summarize => "Summarize",
            Self::Evaluate => "Evaluate",
            Self::Propose => "Propose",
            Self::Generate => "Generate",
            Self::Done => "Done",
        };
        write!(f, "{name}")
    }
}
