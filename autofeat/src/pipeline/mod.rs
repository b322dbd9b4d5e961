//! Stage orchestration: the finite-state machine driving the
//! featurization feedback loop.

mod orchestrator;

pub use orchestrator::{next_stage, Orchestrator};
