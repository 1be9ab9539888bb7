//! Engine configuration, typically stored as `branchwise.toml`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// Engine configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub batch: BatchLimits,
    pub explore: ExploreLimits,
}

/// Limits for concurrent batch evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchLimits {
    /// Maximum number of elements evaluated at the same time.
    pub max_workers: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_workers: thread::available_parallelism().map_or(4, |n| n.get()),
        }
    }
}

impl BatchLimits {
    pub fn with_workers(max_workers: usize) -> Self {
        Self { max_workers }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(anyhow!("batch.max_workers must be > 0"));
        }
        Ok(())
    }
}

/// Limits for branch exploration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExploreLimits {
    /// Stop after expanding this many branches. `0` means unlimited.
    pub max_branches: u64,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(contents).context("parse engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate and render as TOML, newline-terminated.
    pub fn to_toml_string(&self) -> Result<String> {
        self.validate()?;
        let mut buf = toml::to_string_pretty(self).context("serialize engine config")?;
        if !buf.ends_with('\n') {
            buf.push('\n');
        }
        Ok(buf)
    }
}

/// Read the config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            EngineConfig::from_toml_str(&contents).with_context(|| format!("load {}", path.display()))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let cfg = EngineConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

/// Replace the config at `path` in one step, creating parent directories.
///
/// The document is written to a temporary file next to `path` and renamed
/// over it, so readers see either the old or the new config.
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    let contents = cfg.to_toml_string()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("stage config in {}", dir.display()))?;
    staged
        .write_all(contents.as_bytes())
        .context("write staged config")?;
    staged
        .persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
