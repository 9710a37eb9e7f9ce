//! Sources of non-determinism the evaluator depends on.
//!
//! Production code uses random UUIDs, the system clock and `git`; tests swap
//! in fixed values.

use crate::directive::options::VersionStyle;
use crate::directive::version::GitVersion;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub trait IdSource {
    fn next_id(&self) -> String;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Supplies the current version of the project the template belongs to.
pub trait VersionResolver {
    fn resolve(&self, style: VersionStyle) -> Result<String>;
}

pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything a directive may consult besides the tree itself.
pub struct EvalEnv {
    pub ids: Box<dyn IdSource>,
    pub clock: Box<dyn Clock>,
    pub versions: Box<dyn VersionResolver>,
    /// Base directory for relative paths in an in-memory root document.
    pub base_dir: PathBuf,
}

impl Default for EvalEnv {
    fn default() -> Self {
        Self {
            ids: Box::new(RandomIds),
            clock: Box::new(SystemClock),
            versions: Box::new(GitVersion::new(".")),
            base_dir: PathBuf::from("."),
        }
    }
}

impl EvalEnv {
    pub fn with_ids(mut self, ids: impl IdSource + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_versions(mut self, versions: impl VersionResolver + 'static) -> Self {
        self.versions = Box::new(versions);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }
}
