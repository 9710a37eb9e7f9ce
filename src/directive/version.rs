//! Project version from `git describe`.

use crate::directive::env::VersionResolver;
use crate::directive::options::VersionStyle;
use crate::error::{Error, Result};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Runs `git describe` in a fixed directory.
pub struct GitVersion {
    dir: PathBuf,
}

impl GitVersion {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl VersionResolver for GitVersion {
    fn resolve(&self, style: VersionStyle) -> Result<String> {
        let output = Command::new("git")
            .args(["describe", "--tags", "--long", "--dirty", "--always"])
            .current_dir(&self.dir)
            .output()
            .map_err(|e| unavailable(format!("cannot run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "git describe failed in {}: {}",
                self.dir.display(),
                stderr.trim()
            )));
        }

        let described = String::from_utf8_lossy(&output.stdout);
        debug!(dir = %self.dir.display(), describe = %described.trim(), "resolved git version");
        Ok(Describe::parse(described.trim())?.render(style))
    }
}

fn unavailable(reason: String) -> Error {
    Error::VersionUnavailable { reason }
}

/// Parsed `git describe --tags --long --dirty --always` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Describe {
    pub base: String,
    pub distance: u64,
    pub commit: Option<String>,
    pub dirty: bool,
    pub tagged: bool,
}

impl Describe {
    /// Version used when no repository is available at all.
    pub fn fallback() -> Self {
        Self {
            base: "0.0.0".to_string(),
            distance: 0,
            commit: None,
            dirty: false,
            tagged: true,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        // v1.2.3-4-gabc1234[-dirty]
        const TAGGED_RE: &str =
            r"^v?(\d+\.\d+\.\d+)-(\d+)-g([0-9a-f]+)(-dirty)?$";
        // abc1234[-dirty] when no tag is reachable
        const UNTAGGED_RE: &str = r"^([0-9a-f]{4,})(-dirty)?$";

        let tagged = Regex::new(TAGGED_RE).map_err(|e| unavailable(e.to_string()))?;
        if let Some(caps) = tagged.captures(text) {
            let distance = caps[2]
                .parse()
                .map_err(|_| unavailable(format!("bad commit distance in {:?}", text)))?;
            return Ok(Self {
                base: caps[1].to_string(),
                distance,
                commit: Some(caps[3].to_string()),
                dirty: caps.get(4).is_some(),
                tagged: true,
            });
        }

        let untagged = Regex::new(UNTAGGED_RE).map_err(|e| unavailable(e.to_string()))?;
        if let Some(caps) = untagged.captures(text) {
            return Ok(Self {
                base: "0.0.0".to_string(),
                distance: 0,
                commit: Some(caps[1].to_string()),
                dirty: caps.get(2).is_some(),
                tagged: false,
            });
        }

        Err(unavailable(format!(
            "unrecognized git describe output {:?}",
            text
        )))
    }

    pub fn render(&self, style: VersionStyle) -> String {
        let mut out = self.base.clone();
        if self.distance > 0 {
            match style {
                VersionStyle::SemVer => out.push_str(&format!("-post.{}", self.distance)),
                VersionStyle::Pep440 => out.push_str(&format!(".post{}.dev0", self.distance)),
            }
        }

        let mut metadata = Vec::new();
        if self.distance > 0 || !self.tagged {
            metadata.extend(self.commit.as_deref());
        }
        if self.dirty {
            metadata.push("dirty");
        }
        if !metadata.is_empty() {
            out.push('+');
            out.push_str(&metadata.join("."));
        }
        out
    }
}
