//! Branching evaluation engine.
//!
//! Two halves that are usable on their own and compose naturally:
//!
//! - **Exploration** ([`explore`]): enumerate every reachable path of a
//!   [`Subject`](core::subject::Subject) by depth-first backtracking. Pending
//!   branches are stored as event logs ([`History`](core::history::History))
//!   and rebuilt by replay, so only one live subject exists at a time.
//! - **Batch evaluation** ([`batch`]): evaluate many elements on a bounded
//!   worker pool, partition results into valid and invalid, and aggregate them
//!   so that any solution supersedes every error.
//!
//! [`core`] holds the pure pieces shared by both: ranked aggregation
//! ([`Rank`](core::rank::Rank), [`ErrOrSol`](core::err_or_sol::ErrOrSol)),
//! histories, and the typed errors callers can match on.

pub mod batch;
pub mod cancel;
pub mod config;
pub mod core;
pub mod explore;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
