//! Exhaustive depth-first exploration of a subject's branching event space.
//!
//! Pending branches are kept only as [`History`] logs on a LIFO stack. Each
//! popped log is turned back into state by building a fresh subject and
//! replaying the log into it, so at most one live subject exists at a time.
//!
//! Exploration order is implementation-defined: the first candidate returned
//! by [`Subject::next_events`] continues the current branch and the remaining
//! candidates are forked onto the stack, last pushed first explored.

use std::collections::VecDeque;

use anyhow::{Context, Result};
use tracing::{debug, instrument, trace, warn};

use crate::config::{EngineConfig, ExploreLimits};
use crate::core::errors::BranchBudgetExceeded;
use crate::core::history::History;
use crate::core::subject::Subject;

/// A terminal subject produced by exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Explored<S> {
    /// The branch ended without the subject reporting an error.
    Valid(S),
    /// The branch ended with `has_error() == true`.
    Invalid(S),
}

impl<S> Explored<S> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Explored::Valid(_))
    }

    pub fn subject(&self) -> &S {
        match self {
            Explored::Valid(subject) | Explored::Invalid(subject) => subject,
        }
    }

    pub fn into_inner(self) -> S {
        match self {
            Explored::Valid(subject) | Explored::Invalid(subject) => subject,
        }
    }
}

/// Counters describing one exploration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExploreStats {
    /// Histories popped and expanded.
    pub branches: u64,
    /// Forks pushed onto the stack.
    pub forks: u64,
    pub valid: u64,
    pub invalid: u64,
}

/// Align `subject` to `history`, then follow the first candidate at every
/// decision point until the subject is done or offers nothing.
///
/// Every other candidate becomes a rewound fork of the history as it was at
/// that decision point. The forks are returned; `history` ends up holding the
/// path that was actually taken.
#[instrument(skip_all, fields(replay = history.pending().len()))]
pub fn execute_until<S: Subject>(
    subject: &mut S,
    history: &mut History<S::Event>,
) -> Result<Vec<History<S::Event>>> {
    history.align(subject).context("align subject to history")?;

    let mut forks = Vec::new();
    if subject.has_error() {
        return Ok(forks);
    }

    loop {
        let mut candidates = subject
            .next_events()
            .context("ask subject for next events")?
            .into_iter();
        let Some(selected) = candidates.next() else {
            break;
        };
        for alternative in candidates {
            forks.push(history.fork(alternative));
        }

        history.push(selected);
        if history.apply_once(subject).context("apply event")? {
            break;
        }
    }

    debug!(depth = history.len(), forks = forks.len(), "branch expanded");
    Ok(forks)
}

/// Lazy, pull-based exploration of every branch of a subject.
///
/// Valid subjects are yielded as soon as their branch ends. Invalid subjects
/// are held back and yielded in discovery order once every branch has been
/// explored. The first error is yielded once and ends the iteration; dropping
/// the iterator abandons whatever is left on the stack.
pub struct Explorer<S: Subject, F> {
    init: F,
    stack: Vec<History<S::Event>>,
    invalid: VecDeque<S>,
    limits: ExploreLimits,
    stats: ExploreStats,
    fused: bool,
}

impl<S, F> Explorer<S, F>
where
    S: Subject,
    F: FnMut() -> Result<S>,
{
    /// `init` must build an identical fresh subject on every call.
    pub fn new(init: F) -> Self {
        Self::with_limits(init, ExploreLimits::default())
    }

    pub fn with_limits(init: F, limits: ExploreLimits) -> Self {
        Self {
            init,
            stack: vec![History::new()],
            invalid: VecDeque::new(),
            limits,
            stats: ExploreStats::default(),
            fused: false,
        }
    }

    /// Explorer bounded by the `[explore]` section of a loaded config.
    pub fn from_config(init: F, config: &EngineConfig) -> Self {
        Self::with_limits(init, config.explore)
    }

    pub fn stats(&self) -> ExploreStats {
        self.stats
    }

    /// Branches still waiting on the stack.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    fn over_budget(&self) -> bool {
        self.limits.max_branches > 0 && self.stats.branches >= self.limits.max_branches
    }

    /// Expand one branch. Returns the subject if it ended valid.
    fn expand(&mut self, history: &mut History<S::Event>) -> Result<Option<S>> {
        let mut subject = (self.init)().context("initialize subject")?;
        if subject.has_error() {
            trace!("subject broken before replay");
            self.stats.invalid += 1;
            self.invalid.push_back(subject);
            return Ok(None);
        }

        let forks = execute_until(&mut subject, history)?;
        self.stats.forks += forks.len() as u64;
        self.stack.extend(forks);

        if subject.has_error() {
            self.stats.invalid += 1;
            self.invalid.push_back(subject);
            return Ok(None);
        }
        self.stats.valid += 1;
        Ok(Some(subject))
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<Explored<S>>> {
        warn!(err = %format!("{err:#}"), pending = self.stack.len(), "exploration stopped");
        self.fused = true;
        self.stack.clear();
        self.invalid.clear();
        Some(Err(err))
    }
}

impl<S, F> Iterator for Explorer<S, F>
where
    S: Subject,
    F: FnMut() -> Result<S>,
{
    type Item = Result<Explored<S>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }

        while !self.stack.is_empty() {
            if self.over_budget() {
                let max_branches = self.limits.max_branches;
                return self.fail(BranchBudgetExceeded { max_branches }.into());
            }
            let Some(mut history) = self.stack.pop() else {
                break;
            };
            self.stats.branches += 1;
            match self.expand(&mut history) {
                Ok(Some(subject)) => return Some(Ok(Explored::Valid(subject))),
                Ok(None) => {}
                Err(err) => {
                    let depth = history.len();
                    return self.fail(err.context(format!("explore branch at depth {depth}")));
                }
            }
        }

        match self.invalid.pop_front() {
            Some(subject) => Some(Ok(Explored::Invalid(subject))),
            None => {
                if !self.fused {
                    debug!(
                        branches = self.stats.branches,
                        valid = self.stats.valid,
                        invalid = self.stats.invalid,
                        "exploration finished"
                    );
                    self.fused = true;
                }
                None
            }
        }
    }
}

/// Explore every branch and collect the terminal subjects, valid ones first.
///
/// Stops at the first error.
pub fn explore_all<S, F>(init: F) -> Result<Vec<S>>
where
    S: Subject,
    F: FnMut() -> Result<S>,
{
    explore_all_with(init, ExploreLimits::default())
}

pub fn explore_all_with<S, F>(init: F, limits: ExploreLimits) -> Result<Vec<S>>
where
    S: Subject,
    F: FnMut() -> Result<S>,
{
    Explorer::with_limits(init, limits)
        .map(|item| item.map(Explored::into_inner))
        .collect()
}
