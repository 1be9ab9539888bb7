//! Valid/invalid partitioning of batch results, aggregated by one listener.
//!
//! Each element is evaluated into candidate results, partitioned with
//! [`Verdict::has_error`], optionally refined by a mid-stage, and sent as a
//! single [`Pair`]. The listener keeps invalid results only until the first
//! valid pair arrives; from then on solutions supersede them for good.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::batch::executor::execute_batch;
use crate::cancel::CancelToken;
use crate::config::{BatchLimits, EngineConfig};
use crate::core::errors::{NoValidResults, is_no_valid_results};
use crate::core::subject::Verdict;

/// Results of one element, all valid or all invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair<T> {
    pub results: Vec<T>,
    pub is_valid: bool,
}

impl<T> Pair<T> {
    /// The valid subset if it is non-empty, else everything else as invalid.
    fn from_partition(valid: Vec<T>, invalid: Vec<T>) -> Self {
        if valid.is_empty() {
            Pair {
                results: invalid,
                is_valid: false,
            }
        } else {
            Pair {
                results: valid,
                is_valid: true,
            }
        }
    }
}

/// Mid-stage run on the valid candidates of one element.
///
/// Returning [`NoValidResults`] means the stage ran but kept nothing; its
/// inputs are then reported as invalid instead of failing the element.
pub type MidFn<T> =
    Arc<dyn Fn(CancelToken, Vec<T>) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Future returned by the task built in [`make_batch_fn`].
pub type BatchFuture = BoxFuture<'static, Result<()>>;

/// Box an async closure into a [`MidFn`].
pub fn mid_fn<T, M, Fut>(mid: M) -> MidFn<T>
where
    M: Fn(CancelToken, Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    Arc::new(move |cancel: CancelToken, candidates: Vec<T>| {
        mid(cancel, candidates).boxed()
    })
}

/// Build the per-element task for [`evaluate`] / [`execute_batch`].
///
/// `eval` runs on the blocking pool and its errors fail the element. The token
/// is checked before `eval` starts and handed to `mid`.
pub fn make_batch_fn<E, T, Ev>(
    eval: Ev,
    mid: Option<MidFn<T>>,
) -> impl Fn(CancelToken, mpsc::Sender<Pair<T>>, E) -> BatchFuture + Send + Sync + 'static
where
    E: Send + 'static,
    T: Verdict + Clone + Send + 'static,
    Ev: Fn(E) -> Result<Vec<T>> + Send + Sync + 'static,
{
    let eval = Arc::new(eval);
    move |cancel: CancelToken, out: mpsc::Sender<Pair<T>>, elem: E| {
        let eval = Arc::clone(&eval);
        let mid = mid.clone();
        async move {
            if cancel.is_cancelled() {
                bail!("cancelled before evaluation");
            }
            let candidates = tokio::task::spawn_blocking(move || eval(elem))
                .await
                .context("join evaluation")??;
            let pair = refine(&cancel, candidates, mid.as_ref()).await?;
            out.send(pair)
                .await
                .map_err(|_| anyhow!("result listener closed"))?;
            Ok(())
        }
        .boxed()
    }
}

async fn refine<T>(
    cancel: &CancelToken,
    candidates: Vec<T>,
    mid: Option<&MidFn<T>>,
) -> Result<Pair<T>>
where
    T: Verdict + Clone,
{
    let (valid, invalid): (Vec<T>, Vec<T>) =
        candidates.into_iter().partition(|c| !c.has_error());
    let Some(mid) = mid.filter(|_| !valid.is_empty()) else {
        return Ok(Pair::from_partition(valid, invalid));
    };

    match mid(cancel.clone(), valid.clone()).await {
        Ok(refined) => {
            let (kept, mut dropped): (Vec<T>, Vec<T>) =
                refined.into_iter().partition(|c| !c.has_error());
            dropped.extend(invalid);
            Ok(Pair::from_partition(kept, dropped))
        }
        Err(err) if is_no_valid_results(&err) => {
            debug!(inputs = valid.len(), "mid-stage kept nothing");
            let mut results = valid;
            results.extend(invalid);
            Ok(Pair {
                results,
                is_valid: false,
            })
        }
        Err(err) => Err(err),
    }
}

/// Outcome of [`evaluate`].
///
/// `error` is `None` exactly when `results` are solutions.
#[derive(Debug)]
pub struct Evaluation<T> {
    pub results: Vec<T>,
    pub error: Option<anyhow::Error>,
}

impl<T> Evaluation<T> {
    pub fn is_solved(&self) -> bool {
        self.error.is_none()
    }

    /// Solutions, or the error (partial results are dropped).
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

#[derive(Debug)]
struct Accumulator<T> {
    solutions: Vec<T>,
    invalids: Vec<T>,
    solved: bool,
}

impl<T> Default for Accumulator<T> {
    fn default() -> Self {
        Self {
            solutions: Vec::new(),
            invalids: Vec::new(),
            solved: false,
        }
    }
}

impl<T> Accumulator<T> {
    fn accept(&mut self, pair: Pair<T>) {
        if pair.is_valid {
            if !self.solved {
                self.solved = true;
                self.invalids.clear();
            }
            self.solutions.extend(pair.results);
        } else if !self.solved {
            self.invalids.extend(pair.results);
        }
    }

    fn finish(mut self, batch: Result<()>) -> Evaluation<T> {
        if let Err(err) = batch {
            self.solutions.append(&mut self.invalids);
            return Evaluation {
                results: self.solutions,
                error: Some(err),
            };
        }
        if !self.solutions.is_empty() {
            return Evaluation {
                results: self.solutions,
                error: None,
            };
        }
        Evaluation {
            results: self.invalids,
            error: Some(NoValidResults.into()),
        }
    }
}

/// Evaluate every element with `batch_fn` and aggregate the pairs.
///
/// - batch error: solutions followed by invalids, plus that error
/// - any solution: the solutions, no error
/// - otherwise: the invalids plus [`NoValidResults`]
#[instrument(skip_all, fields(elems = elems.len()))]
pub async fn evaluate<E, T, F, Fut>(
    cancel: &CancelToken,
    elems: Vec<E>,
    limits: BatchLimits,
    batch_fn: F,
) -> Evaluation<T>
where
    E: Send + 'static,
    T: Send + 'static,
    F: Fn(CancelToken, mpsc::Sender<Pair<T>>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Pair<T>>(elems.len().max(1));
    let listener = tokio::spawn(async move {
        let mut acc = Accumulator::default();
        while let Some(pair) = rx.recv().await {
            acc.accept(pair);
        }
        acc
    });

    let batch = execute_batch(cancel, &tx, elems, limits, batch_fn).await;
    drop(tx);

    match listener.await {
        Ok(acc) => {
            debug!(
                solutions = acc.solutions.len(),
                invalids = acc.invalids.len(),
                "evaluation collected"
            );
            acc.finish(batch)
        }
        Err(err) => {
            warn!(err = %err, "result listener failed");
            Evaluation {
                results: Vec::new(),
                error: Some(anyhow::Error::new(err).context("join result listener")),
            }
        }
    }
}

/// [`evaluate`] with the worker pool sized by the `[batch]` section of
/// `config`.
pub async fn evaluate_with_config<E, T, F, Fut>(
    cancel: &CancelToken,
    elems: Vec<E>,
    config: &EngineConfig,
    batch_fn: F,
) -> Evaluation<T>
where
    E: Send + 'static,
    T: Send + 'static,
    F: Fn(CancelToken, mpsc::Sender<Pair<T>>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    evaluate(cancel, elems, config.batch, batch_fn).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::JoinedError;
    use crate::test_support::Scored;

    async fn run_one(
        batch_fn: impl Fn(CancelToken, mpsc::Sender<Pair<Scored>>, i64) -> BatchFuture,
        elem: i64,
    ) -> Result<Pair<Scored>> {
        let (tx, mut rx) = mpsc::channel(1);
        batch_fn(CancelToken::new(), tx, elem).await?;
        rx.recv().await.context("pair sent")
    }

    fn spread(elem: i64) -> Result<Vec<Scored>> {
        Ok(vec![Scored::ok(elem), Scored::bad(-elem), Scored::ok(elem * 10)])
    }

    #[tokio::test]
    async fn valid_subset_is_sent_without_mid() {
        let pair = run_one(make_batch_fn(spread, None), 2).await.expect("pair");
        assert_eq!(
            pair,
            Pair {
                results: vec![Scored::ok(2), Scored::ok(20)],
                is_valid: true
            }
        );
    }

    #[tokio::test]
    async fn all_invalid_candidates_are_sent_as_invalid() {
        let batch_fn = make_batch_fn(|e: i64| Ok(vec![Scored::bad(e), Scored::bad(e + 1)]), None);
        let pair = run_one(batch_fn, 5).await.expect("pair");
        assert!(!pair.is_valid);
        assert_eq!(pair.results.len(), 2);
    }

    #[tokio::test]
    async fn mid_stage_refines_valid_candidates() {
        let mid = mid_fn(|_cancel, candidates: Vec<Scored>| async move {
            anyhow::Ok(
                candidates
                    .into_iter()
                    .map(|c| Scored::ok(c.value + 1))
                    .collect::<Vec<_>>(),
            )
        });
        let pair = run_one(make_batch_fn(spread, Some(mid)), 3).await.expect("pair");
        assert_eq!(pair.results, vec![Scored::ok(4), Scored::ok(31)]);
        assert!(pair.is_valid);
    }

    #[tokio::test]
    async fn mid_stage_no_valid_results_downgrades_inputs() {
        let mid = mid_fn(|_cancel, _candidates: Vec<Scored>| async move {
            Err::<Vec<Scored>, anyhow::Error>(NoValidResults.into())
        });
        let pair = run_one(make_batch_fn(spread, Some(mid)), 1).await.expect("pair");
        assert!(!pair.is_valid);
        assert_eq!(
            pair.results,
            vec![Scored::ok(1), Scored::ok(10), Scored::bad(-1)]
        );
    }

    #[tokio::test]
    async fn mid_stage_hard_error_fails_element() {
        let mid = mid_fn(|_cancel, _candidates: Vec<Scored>| async move {
            Err::<Vec<Scored>, anyhow::Error>(anyhow!("ranker offline"))
        });
        let err = run_one(make_batch_fn(spread, Some(mid)), 1)
            .await
            .expect_err("hard error");
        assert_eq!(err.to_string(), "ranker offline");
    }

    #[tokio::test]
    async fn mid_stage_is_skipped_without_valid_candidates() {
        let mid = mid_fn(|_cancel, _candidates: Vec<Scored>| async move {
            Err::<Vec<Scored>, anyhow::Error>(anyhow!("must not run"))
        });
        let batch_fn = make_batch_fn(|e: i64| Ok(vec![Scored::bad(e)]), Some(mid));
        let pair = run_one(batch_fn, 4).await.expect("pair");
        assert!(!pair.is_valid);
    }

    #[test]
    fn first_valid_pair_clears_invalids_for_good() {
        let mut acc = Accumulator::default();
        acc.accept(Pair {
            results: vec![Scored::bad(1)],
            is_valid: false,
        });
        acc.accept(Pair {
            results: vec![Scored::ok(2)],
            is_valid: true,
        });
        acc.accept(Pair {
            results: vec![Scored::bad(3)],
            is_valid: false,
        });
        let evaluation = acc.finish(Ok(()));
        assert!(evaluation.is_solved());
        assert_eq!(evaluation.results, vec![Scored::ok(2)]);
    }

    #[tokio::test]
    async fn evaluate_returns_solutions_when_any_element_solves() {
        let batch_fn = make_batch_fn(
            |e: i64| {
                if e == 3 {
                    Ok(vec![Scored::ok(e)])
                } else {
                    Ok(vec![Scored::bad(e)])
                }
            },
            None,
        );
        let evaluation = evaluate(
            &CancelToken::new(),
            vec![1, 2, 3, 4],
            BatchLimits::with_workers(2),
            batch_fn,
        )
        .await;
        assert_eq!(evaluation.into_result().expect("solved"), vec![Scored::ok(3)]);
    }

    #[tokio::test]
    async fn evaluate_without_solutions_reports_no_valid_results() {
        let batch_fn = make_batch_fn(|e: i64| Ok(vec![Scored::bad(e)]), None);
        let evaluation = evaluate(
            &CancelToken::new(),
            vec![1, 2],
            BatchLimits::with_workers(2),
            batch_fn,
        )
        .await;
        let err = evaluation.error.as_ref().expect("no solutions");
        assert!(is_no_valid_results(err));
        let mut values: Vec<i64> = evaluation.results.iter().map(|s| s.value).collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn evaluate_hard_error_keeps_partial_results() {
        let batch_fn = make_batch_fn(
            |e: i64| {
                if e == 2 {
                    bail!("element {e} exploded");
                }
                Ok(vec![Scored::ok(e)])
            },
            None,
        );
        let evaluation = evaluate(
            &CancelToken::new(),
            vec![1, 2, 3],
            BatchLimits::with_workers(3),
            batch_fn,
        )
        .await;

        let err = evaluation.error.as_ref().expect("hard error");
        assert!(!is_no_valid_results(err));
        let joined = err.downcast_ref::<JoinedError>().expect("joined");
        assert_eq!(joined.len(), 1);
        assert_eq!(err.to_string(), "element 2 exploded");
        let mut values: Vec<i64> = evaluation.results.iter().map(|s| s.value).collect();
        values.sort();
        assert_eq!(values, vec![1, 3]);
    }

    #[tokio::test]
    async fn evaluate_empty_input_has_no_valid_results() {
        let batch_fn = make_batch_fn(|e: i64| Ok(vec![Scored::ok(e)]), None);
        let evaluation = evaluate(
            &CancelToken::new(),
            Vec::new(),
            BatchLimits::with_workers(1),
            batch_fn,
        )
        .await;
        assert!(evaluation.results.is_empty());
        assert!(is_no_valid_results(
            evaluation.error.as_ref().expect("nothing evaluated")
        ));
    }

    #[tokio::test]
    async fn cancelled_token_stops_evaluation_before_eval() {
        let token = CancelToken::new();
        token.cancel();
        let batch_fn = make_batch_fn(|e: i64| Ok(vec![Scored::ok(e)]), None);
        let evaluation = evaluate(&token, vec![1, 2], BatchLimits::with_workers(1), batch_fn).await;
        assert!(evaluation.results.is_empty());
        let err = evaluation.error.expect("cancelled");
        assert_eq!(
            err.downcast_ref::<JoinedError>().expect("joined").len(),
            2
        );
    }
}
