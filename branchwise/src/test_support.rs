//! Test-only subjects with deterministic, scripted behavior.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};

use crate::core::subject::{Subject, Verdict};

/// Accumulates integer events until `total >= limit`.
///
/// Negative events put the subject into its error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSubject {
    pub total: i64,
    pub limit: i64,
    pub errored: bool,
    pub applied: Vec<i64>,
    pub choices: Vec<i64>,
}

impl CounterSubject {
    pub fn new(limit: i64) -> Self {
        Self {
            total: 0,
            limit,
            errored: false,
            applied: Vec::new(),
            choices: vec![1],
        }
    }

    /// Offer `choices` as candidates at every decision point.
    pub fn with_choices(limit: i64, choices: Vec<i64>) -> Self {
        Self {
            choices,
            ..Self::new(limit)
        }
    }

    fn finished(&self) -> bool {
        self.errored || self.total >= self.limit
    }
}

impl Verdict for CounterSubject {
    fn has_error(&self) -> bool {
        self.errored
    }
}

impl Subject for CounterSubject {
    type Event = i64;

    fn apply_event(&mut self, event: &i64) -> Result<bool> {
        if *event < 0 {
            self.errored = true;
            return Ok(true);
        }
        self.total += event;
        self.applied.push(*event);
        Ok(self.finished())
    }

    fn next_events(&mut self) -> Result<Vec<i64>> {
        if self.finished() {
            return Ok(Vec::new());
        }
        Ok(self.choices.clone())
    }
}

/// Decision tree keyed by `/`-joined event paths (the root is `""`).
#[derive(Debug, Default)]
pub struct Script {
    choices: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    hard_errors: HashSet<String>,
    enumeration_errors: HashSet<String>,
    broken_at_start: bool,
    constructed: AtomicUsize,
    applied: AtomicUsize,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate events offered after reaching `path`.
    pub fn choices(mut self, path: &str, options: &[&str]) -> Self {
        self.choices.insert(
            path.to_string(),
            options.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Reaching `path` puts the subject into its error state.
    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Reaching `path` makes `apply_event` return an error.
    pub fn hard_error(mut self, path: &str) -> Self {
        self.hard_errors.insert(path.to_string());
        self
    }

    /// Asking for candidates at `path` makes `next_events` return an error.
    pub fn enumeration_error(mut self, path: &str) -> Self {
        self.enumeration_errors.insert(path.to_string());
        self
    }

    /// Every subject starts in its error state.
    pub fn broken_at_start(mut self) -> Self {
        self.broken_at_start = true;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of subjects built from this script.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Number of events applied across all subjects, replays included.
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

/// Subject that walks a [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptedSubject {
    script: Arc<Script>,
    path: Vec<String>,
    failed: bool,
}

impl ScriptedSubject {
    pub fn new(script: &Arc<Script>) -> Self {
        script.constructed.fetch_add(1, Ordering::SeqCst);
        Self {
            script: Arc::clone(script),
            path: Vec::new(),
            failed: script.broken_at_start,
        }
    }

    /// Initializer closure for [`crate::explore::Explorer`].
    pub fn init(script: &Arc<Script>) -> impl FnMut() -> Result<ScriptedSubject> + use<> {
        let script = Arc::clone(script);
        move || Ok(ScriptedSubject::new(&script))
    }

    pub fn path(&self) -> String {
        self.path.join("/")
    }
}

impl Verdict for ScriptedSubject {
    fn has_error(&self) -> bool {
        self.failed
    }
}

impl Subject for ScriptedSubject {
    type Event = String;

    fn apply_event(&mut self, event: &String) -> Result<bool> {
        self.script.applied.fetch_add(1, Ordering::SeqCst);
        self.path.push(event.clone());
        let key = self.path();
        if self.script.hard_errors.contains(&key) {
            bail!("apply {key} failed");
        }
        if self.script.failing.contains(&key) {
            self.failed = true;
            return Ok(true);
        }
        Ok(!self.script.choices.contains_key(&key))
    }

    fn next_events(&mut self) -> Result<Vec<String>> {
        if self.failed {
            return Ok(Vec::new());
        }
        let key = self.path();
        if self.script.enumeration_errors.contains(&key) {
            bail!("next events at {key} failed");
        }
        Ok(self.script.choices.get(&key).cloned().unwrap_or_default())
    }
}

/// Evaluation result used by batch tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub value: i64,
    pub ok: bool,
}

impl Scored {
    pub fn ok(value: i64) -> Self {
        Self { value, ok: true }
    }

    pub fn bad(value: i64) -> Self {
        Self { value, ok: false }
    }
}

impl Verdict for Scored {
    fn has_error(&self) -> bool {
        !self.ok
    }
}
