//! # Autofeat
//!
//! An LLM-driven iterative feature engineering pipeline for tabular
//! data.
//!
//! Autofeat reads a scientific manuscript and its accompanying dataset,
//! then loops a four-stage pipeline to grow the feature set:
//!
//! - **Summarize**: distill the manuscript and map every column to its
//!   physical meaning
//! - **Evaluate**: fit a baseline model and rank feature importance
//! - **Propose**: ask the backend for new derived features, informed by
//!   the latest evaluation
//! - **Generate**: compile each natural-language derivation into a real
//!   dataframe column, isolating per-feature failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autofeat::prelude::*;
//! use std::sync::Arc;
//!
//! let state = AutoFeaturizer::from_paths("paper.md", "data.csv", "y", 3)?
//!     .with_task(Task::Regression)
//!     .run(backend, Arc::new(LinearEvaluator::new()))
//!     .await?;
//!
//! println!("{}", state.datalog.last().unwrap().narrative);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod compiler;
pub mod contract;
pub mod driver;
pub mod errors;
pub mod eval;
pub mod frame;
pub mod loader;
pub mod pipeline;
pub mod stages;
pub mod state;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{BackendError, ChatBackend, ChatMessage, Role};
    pub use crate::compiler::{
        BackendResolver, CompileOutcome, Expr, FeatureCompiler, RuleResolver,
        TransformResolver,
    };
    pub use crate::contract::{ContractCaller, RetryConfig};
    pub use crate::driver::{init_tracing, AutoFeaturizer};
    pub use crate::errors::{AutofeatError, FeatureCompilationError};
    pub use crate::eval::{
        EvalReport, Evaluator, LinearEvaluator, Metrics, Task,
    };
    pub use crate::frame::{Column, Frame};
    pub use crate::loader::{load_csv, load_manuscript};
    pub use crate::pipeline::{next_stage, Orchestrator};
    pub use crate::stages::StageKind;
    pub use crate::state::PipelineState;
}
