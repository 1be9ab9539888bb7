//! Deterministic, single-threaded building blocks.
//!
//! Nothing in here spawns tasks or touches the filesystem.

pub mod err_or_sol;
pub mod errors;
pub mod history;
pub mod rank;
pub mod subject;
