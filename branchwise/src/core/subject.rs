//! Capabilities the engine requires from user-supplied state machines.

use anyhow::Result;

/// Anything that can report whether it ended in an error state.
///
/// Used to partition evaluation results into valid and invalid.
pub trait Verdict {
    fn has_error(&self) -> bool;
}

/// A stateful, event-driven entity whose branching behavior is explored.
///
/// # Replay contract
///
/// Pending branches are stored only as event logs and rebuilt by constructing
/// a fresh subject and replaying its log. Implementations must therefore be
/// deterministic: the initializer and [`Subject::apply_event`] have to be pure
/// functions of the initial state and the event sequence, and
/// [`Subject::next_events`] must return the same candidates in the same order
/// for the same state. Nothing checks this; a violation surfaces as a
/// [`MisalignedError`](crate::core::errors::MisalignedError) at best and as
/// silently wrong exploration at worst.
///
/// Once [`Verdict::has_error`] returns true the subject must behave as
/// terminal.
pub trait Subject: Verdict {
    type Event: Clone;

    /// Apply one event. Returns `true` when the subject is done.
    fn apply_event(&mut self, event: &Self::Event) -> Result<bool>;

    /// Candidate events from the current state. Empty means exhausted.
    fn next_events(&mut self) -> Result<Vec<Self::Event>>;
}
