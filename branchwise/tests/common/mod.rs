//! Shared subject for integration tests.

use anyhow::Result;
use branchwise::core::subject::{Subject, Verdict};

/// Picks coins until the running sum reaches `target`.
///
/// Overshooting puts the subject into its error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSubject {
    pub target: u32,
    pub coins: Vec<u32>,
    pub picked: Vec<u32>,
    pub sum: u32,
}

impl CoinSubject {
    pub fn new(target: u32, coins: &[u32]) -> Self {
        Self {
            target,
            coins: coins.to_vec(),
            picked: Vec::new(),
            sum: 0,
        }
    }
}

impl Verdict for CoinSubject {
    fn has_error(&self) -> bool {
        self.sum > self.target
    }
}

impl Subject for CoinSubject {
    type Event = u32;

    fn apply_event(&mut self, coin: &u32) -> Result<bool> {
        self.picked.push(*coin);
        self.sum += coin;
        Ok(self.sum >= self.target)
    }

    fn next_events(&mut self) -> Result<Vec<u32>> {
        if self.sum >= self.target {
            return Ok(Vec::new());
        }
        Ok(self.coins.clone())
    }
}
