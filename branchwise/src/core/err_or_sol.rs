//! Ranked aggregation where any solution supersedes every recorded error.

use std::sync::Arc;

use anyhow::Result;

use crate::core::errors::{JoinedError, NoValidResults};
use crate::core::rank::Rank;

/// Collects ranked errors until the first solution arrives.
///
/// Once [`ErrOrSol::add_sol`] has been called, errors are dropped and further
/// [`ErrOrSol::add_err`] calls are ignored until [`ErrOrSol::reset`].
#[derive(Debug)]
pub struct ErrOrSol<T> {
    errs: Option<Rank<Arc<anyhow::Error>>>,
    sols: Option<Rank<T>>,
}

impl<T> Default for ErrOrSol<T> {
    fn default() -> Self {
        Self {
            errs: Some(Rank::new()),
            sols: None,
        }
    }
}

impl<T> ErrOrSol<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` at `rank` unless a solution has already been recorded.
    pub fn add_err(&mut self, rank: i64, err: anyhow::Error) {
        if let Some(errs) = self.errs.as_mut() {
            errs.add(rank, Arc::new(err));
        }
    }

    /// Record a solution and permanently discard all errors.
    pub fn add_sol(&mut self, rank: i64, elem: T) {
        self.errs = None;
        self.sols.get_or_insert_with(Rank::new).add(rank, elem);
    }

    /// Route `result` to [`ErrOrSol::add_sol`] or [`ErrOrSol::add_err`].
    pub fn add_result(&mut self, rank: i64, result: Result<T>) {
        match result {
            Ok(elem) => self.add_sol(rank, elem),
            Err(err) => self.add_err(rank, err),
        }
    }

    /// Solutions, highest rank first. `None` when nothing was recorded.
    pub fn sols(&self) -> Option<Vec<&T>> {
        self.sols
            .as_ref()
            .filter(|sols| !sols.is_empty())
            .map(Rank::build)
    }

    /// Errors, highest rank first. `None` once a solution exists or if empty.
    pub fn errs(&self) -> Option<Vec<&anyhow::Error>> {
        self.errs
            .as_ref()
            .filter(|errs| !errs.is_empty())
            .map(|errs| errs.build().into_iter().map(|err| &**err).collect())
    }

    /// Join every recorded error, highest rank first.
    ///
    /// The aggregate is left untouched; joining twice yields the same errors.
    pub fn join(&self) -> Option<anyhow::Error> {
        let errs = self.errs.as_ref()?;
        JoinedError::join(errs.build().into_iter().cloned())
    }

    /// Drop everything; errors are tracked again and solutions are absent.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Solutions if any were recorded, else the joined errors, else
    /// [`NoValidResults`].
    pub fn into_result(mut self) -> Result<Vec<T>> {
        if let Some(sols) = self.sols.take().filter(|sols| !sols.is_empty()) {
            return Ok(sols.into_build());
        }
        match self.join() {
            Some(err) => Err(err),
            None => Err(NoValidResults.into()),
        }
    }
}
