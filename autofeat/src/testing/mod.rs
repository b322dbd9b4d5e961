//! Testing utilities: scripted backends, fixed evaluators, fixtures.

mod mocks;

pub use mocks::{canned_report, FixedEvaluator, ScriptedBackend};
