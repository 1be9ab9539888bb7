//! Engine limits read from a `branchwise.toml` on disk.

mod common;

use std::fs;

use branchwise::batch::pipeline::{evaluate_with_config, make_batch_fn};
use branchwise::cancel::CancelToken;
use branchwise::config::{BatchLimits, EngineConfig, ExploreLimits, load_config, write_config};
use branchwise::core::errors::BranchBudgetExceeded;
use branchwise::explore::{Explorer, explore_all};
use common::CoinSubject;

#[test]
fn explore_budget_comes_from_the_config_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("branchwise.toml");
    fs::write(&path, "[explore]\nmax_branches = 5\n").expect("write");
    let cfg = load_config(&path).expect("load");

    let mut explorer = Explorer::from_config(|| Ok(CoinSubject::new(10, &[1, 2])), &cfg);
    let err = explorer
        .by_ref()
        .find_map(Result::err)
        .expect("budget error");
    assert_eq!(
        err.downcast_ref::<BranchBudgetExceeded>(),
        Some(&BranchBudgetExceeded { max_branches: 5 })
    );
    assert_eq!(explorer.stats().branches, 5);
    assert!(explorer.next().is_none());
}

#[test]
fn unlimited_default_config_explores_everything() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cfg = load_config(&temp.path().join("absent.toml")).expect("defaults");

    let explored = Explorer::from_config(|| Ok(CoinSubject::new(4, &[1, 2])), &cfg)
        .collect::<anyhow::Result<Vec<_>>>()
        .expect("explore");
    let valid = explored.iter().filter(|item| item.is_valid()).count();
    // Ordered compositions of 4 from {1, 2}.
    assert_eq!(valid, 5);
}

#[tokio::test]
async fn written_config_sizes_the_worker_pool() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("conf").join("branchwise.toml");
    let cfg = EngineConfig {
        batch: BatchLimits::with_workers(1),
        explore: ExploreLimits::default(),
    };
    write_config(&path, &cfg).expect("write");
    let cfg = load_config(&path).expect("load");
    assert_eq!(cfg.batch.max_workers, 1);

    let evaluation = evaluate_with_config(
        &CancelToken::new(),
        vec![(3u32, vec![1u32, 2]), (2, vec![2])],
        &cfg,
        make_batch_fn(
            |(target, coins): (u32, Vec<u32>)| {
                explore_all(move || Ok(CoinSubject::new(target, &coins)))
            },
            None,
        ),
    )
    .await;

    let solutions = evaluation.into_result().expect("solved");
    // {1,1,1}, {1,2}, {2,1} for 3 and {2} for 2.
    assert_eq!(solutions.len(), 4);
    assert!(solutions.iter().all(|s| s.sum == s.target));
}
