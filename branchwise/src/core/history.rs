//! Event logs with a replay cursor.

use anyhow::{Result, anyhow};

use crate::core::errors::{MisalignReason, MisalignedError};
use crate::core::subject::Subject;

/// Ordered event log plus the position up to which it has been replayed.
///
/// `arrow` never exceeds `timeline.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<E> {
    timeline: Vec<E>,
    arrow: usize,
}

impl<E> Default for History<E> {
    fn default() -> Self {
        Self {
            timeline: Vec::new(),
            arrow: 0,
        }
    }
}

impl<E: Clone> History<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unreplayed history from `events`.
    pub fn from_events(events: Vec<E>) -> Self {
        Self {
            timeline: events,
            arrow: 0,
        }
    }

    pub fn events(&self) -> &[E] {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn arrow(&self) -> usize {
        self.arrow
    }

    /// Events appended but not yet applied.
    pub fn pending(&self) -> &[E] {
        &self.timeline[self.arrow..]
    }

    pub fn push(&mut self, event: E) {
        self.timeline.push(event);
    }

    /// Copy the log, rewind the copy, and append `alternative` to it.
    ///
    /// The fork shares nothing with `self` and must be replayed from the start
    /// against a fresh subject.
    pub fn fork(&self, alternative: E) -> Self {
        let mut timeline = Vec::with_capacity(self.timeline.len() + 1);
        timeline.extend_from_slice(&self.timeline);
        timeline.push(alternative);
        Self { timeline, arrow: 0 }
    }

    /// Apply the next unconsumed event and advance the cursor.
    pub fn apply_once<S>(&mut self, subject: &mut S) -> Result<bool>
    where
        S: Subject<Event = E>,
    {
        let event = self
            .timeline
            .get(self.arrow)
            .ok_or_else(|| anyhow!("no pending event at position {}", self.arrow))?;
        let done = subject.apply_event(event)?;
        self.arrow += 1;
        Ok(done)
    }

    /// Replay every pending event into `subject`.
    ///
    /// The subject must still be in progress after the whole log; finishing or
    /// erroring earlier is a [`MisalignedError`]. A second call without new
    /// events is a no-op.
    pub fn align<S>(&mut self, subject: &mut S) -> Result<()>
    where
        S: Subject<Event = E>,
    {
        let len = self.timeline.len();
        while self.arrow < len {
            let position = self.arrow;
            let done = self.apply_once(subject)?;
            if self.arrow == len {
                break;
            }
            let reason = if subject.has_error() {
                Some(MisalignReason::Errored)
            } else if done {
                Some(MisalignReason::Finished)
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(MisalignedError {
                    position,
                    len,
                    reason,
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CounterSubject;

    #[test]
    fn fork_is_rewound_and_independent() {
        let mut history = History::from_events(vec![1, 2]);
        let mut subject = CounterSubject::new(10);
        history.align(&mut subject).expect("align");

        let fork = history.fork(7);
        history.push(3);

        assert_eq!(fork.events(), &[1, 2, 7]);
        assert_eq!(fork.arrow(), 0);
        assert_eq!(history.events(), &[1, 2, 3]);
        assert_eq!(history.arrow(), 2);
    }

    #[test]
    fn align_replays_pending_events() {
        let mut history = History::from_events(vec![1, 2, 3]);
        let mut subject = CounterSubject::new(100);
        history.align(&mut subject).expect("align");
        assert_eq!(subject.total, 6);
        assert_eq!(history.arrow(), 3);
        assert!(history.pending().is_empty());
    }

    #[test]
    fn align_twice_is_a_no_op() {
        let mut history = History::from_events(vec![4, 5]);
        let mut subject = CounterSubject::new(100);
        history.align(&mut subject).expect("first align");
        let after_first = (subject.clone(), history.clone());
        history.align(&mut subject).expect("second align");
        assert_eq!((subject, history), after_first);
    }

    #[test]
    fn align_fails_when_subject_finishes_early() {
        let mut history = History::from_events(vec![5, 5, 1]);
        let mut subject = CounterSubject::new(10);
        let err = history.align(&mut subject).expect_err("misaligned");
        let misaligned = err.downcast_ref::<MisalignedError>().expect("typed");
        assert_eq!(misaligned.reason, MisalignReason::Finished);
        assert_eq!(misaligned.position, 1);
    }

    #[test]
    fn align_fails_when_subject_errors_early() {
        let mut history = History::from_events(vec![-1, 2]);
        let mut subject = CounterSubject::new(10);
        let err = history.align(&mut subject).expect_err("misaligned");
        let misaligned = err.downcast_ref::<MisalignedError>().expect("typed");
        assert_eq!(misaligned.reason, MisalignReason::Errored);
    }

    #[test]
    fn align_allows_finish_on_last_event() {
        let mut history = History::from_events(vec![4, 6]);
        let mut subject = CounterSubject::new(10);
        history.align(&mut subject).expect("finishing on the final event is fine");
        assert_eq!(history.arrow(), 2);
    }

    #[test]
    fn apply_once_without_pending_event_is_an_error() {
        let mut history: History<i64> = History::new();
        let mut subject = CounterSubject::new(10);
        assert!(history.apply_once(&mut subject).is_err());
    }
}
