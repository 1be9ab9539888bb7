//! Typed error values that callers match with `anyhow::Error::downcast_ref`.
//!
//! Everything else in the crate travels as a plain `anyhow::Error`; these types
//! exist for the outcomes a caller needs to tell apart from a genuine failure.

use std::fmt;
use std::sync::Arc;

/// The evaluation machinery ran correctly but produced nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoValidResults;

impl fmt::Display for NoValidResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no valid results")
    }
}

impl std::error::Error for NoValidResults {}

/// Returns true if `err` (or anything in its context chain) is [`NoValidResults`].
pub fn is_no_valid_results(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<NoValidResults>().is_some())
}

/// Why a replay stopped matching the recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisalignReason {
    /// The subject reported `has_error()` before the log was exhausted.
    Errored,
    /// The subject reported done before the log was exhausted.
    Finished,
}

/// A stored event log is no longer a valid in-progress prefix for the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisalignedError {
    /// Index of the last event applied.
    pub position: usize,
    /// Length of the timeline being replayed.
    pub len: usize,
    pub reason: MisalignReason,
}

impl fmt::Display for MisalignedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.reason {
            MisalignReason::Errored => "subject errored",
            MisalignReason::Finished => "subject finished",
        };
        write!(
            f,
            "history misaligned: {what} at event {} of {}",
            self.position + 1,
            self.len
        )
    }
}

impl std::error::Error for MisalignedError {}

/// Exploration stopped after popping the configured number of branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchBudgetExceeded {
    pub max_branches: u64,
}

impl fmt::Display for BranchBudgetExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch budget exceeded (max_branches={})", self.max_branches)
    }
}

impl std::error::Error for BranchBudgetExceeded {}

/// A batch element was never started because the batch was cancelled first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub index: usize,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element {} cancelled before start", self.index)
    }
}

impl std::error::Error for Cancelled {}

/// Several independent failures combined into one error.
///
/// Every message is kept, in the order the errors were given, without
/// deduplication. `Display` writes one error per line using the alternate
/// (`{:#}`) form so each keeps its context chain. Errors are shared, so the
/// same recorded errors can be joined more than once.
#[derive(Debug)]
pub struct JoinedError {
    errors: Vec<Arc<anyhow::Error>>,
}

impl JoinedError {
    /// Combine `errors`. Returns `None` for an empty input.
    pub fn join<I>(errors: I) -> Option<anyhow::Error>
    where
        I: IntoIterator,
        I::Item: Into<Arc<anyhow::Error>>,
    {
        let errors: Vec<Arc<anyhow::Error>> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            return None;
        }
        Some(anyhow::Error::new(JoinedError { errors }))
    }

    pub fn errors(&self) -> &[Arc<anyhow::Error>] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {}
