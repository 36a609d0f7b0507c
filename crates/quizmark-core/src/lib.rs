//! quizmark-core: scoring rules, grading engine and gradebook.
//!
//! This crate defines the quiz data model, the per-question scoring rules,
//! progress and rank derivation, and the traits the rest of quizmark plugs
//! into.

pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod progress;
pub mod results;
pub mod scoring;
pub mod session;
pub mod statistics;
pub mod store;
pub mod traits;
