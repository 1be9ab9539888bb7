//! Concurrent per-element execution with joined error reporting.
//!
//! [`execute_batch`] runs one task per input element on a bounded worker pool
//! and waits for every task before returning. A failing element never aborts
//! its siblings; all failures are collected in an [`ErrorSink`] and returned as
//! one [`JoinedError`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::config::BatchLimits;
use crate::core::errors::{Cancelled, JoinedError};

/// Concurrency-safe error collector shared by the tasks of one batch.
///
/// Errors are tagged with the element index so the joined result is ordered
/// by input position rather than by completion time.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    errors: Arc<Mutex<Vec<(usize, anyhow::Error)>>>,
}

impl ErrorSink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            errors: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    pub fn push(&self, index: usize, err: anyhow::Error) {
        self.lock().push((index, err));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain every collected error and join them in element order.
    pub fn take_joined(&self) -> Option<anyhow::Error> {
        let mut errors = std::mem::take(&mut *self.lock());
        errors.sort_by_key(|(index, _)| *index);
        JoinedError::join(errors.into_iter().map(|(_, err)| err))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(usize, anyhow::Error)>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `run(cancel, out, elem)` for every element and join their errors.
///
/// - At most `limits.max_workers` elements run at the same time.
/// - Every started task runs to completion; failures do not cancel siblings.
/// - Once `cancel` fires, elements that have not started are skipped and each
///   records a [`Cancelled`] error. Started tasks get the token and decide
///   for themselves how to stop.
/// - A panicking task is reported as that element's error.
///
/// An empty `elems` returns `Ok(())` without spawning anything. `out` should
/// have room for every message the tasks send, or senders will wait on the
/// reader.
#[instrument(skip_all, fields(elems = elems.len(), max_workers = limits.max_workers))]
pub async fn execute_batch<E, O, F, Fut>(
    cancel: &CancelToken,
    out: &mpsc::Sender<O>,
    elems: Vec<E>,
    limits: BatchLimits,
    run: F,
) -> Result<()>
where
    E: Send + 'static,
    O: Send + 'static,
    F: Fn(CancelToken, mpsc::Sender<O>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if elems.is_empty() {
        return Ok(());
    }
    limits.validate()?;
    if out.is_closed() {
        bail!("output channel closed before batch start");
    }

    let total = elems.len();
    let run = Arc::new(run);
    let permits = Arc::new(Semaphore::new(limits.max_workers));
    let sink = ErrorSink::with_capacity(total);
    let mut tasks = JoinSet::new();
    let mut skipped = 0usize;

    for (index, elem) in elems.into_iter().enumerate() {
        let permit = if cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => {
                    Some(permit.context("acquire worker permit")?)
                }
            }
        };
        let Some(permit) = permit else {
            skipped += 1;
            sink.push(index, Cancelled { index }.into());
            continue;
        };

        let run = Arc::clone(&run);
        let cancel = cancel.clone();
        let out = out.clone();
        let sink = sink.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = AssertUnwindSafe(run(cancel, out, elem))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(anyhow!(
                        "element {index} panicked: {}",
                        panic_message(payload.as_ref())
                    ))
                });
            if let Err(err) = result {
                debug!(index, err = %format!("{err:#}"), "element failed");
                sink.push(index, err);
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            warn!(err = %err, "batch task did not complete");
            sink.push(total, anyhow::Error::new(err).context("join batch task"));
        }
    }

    let failed = sink.len();
    info!(total, failed, skipped, "batch finished");
    match sink.take_joined() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
