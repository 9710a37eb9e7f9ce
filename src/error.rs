//! Error taxonomy shared by the template and openapi pipelines.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Line/column of a node in the source text (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Renders an optional position as a " at line L column C" suffix.
pub(crate) struct At<'a>(pub &'a Option<Position>);

impl std::fmt::Display for At<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(pos) => write!(f, " at {}", pos),
            None => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A marker node does not have the shape its tag requires.
    #[error("!{tag} expects {expected}{}", At(.position))]
    TagValidation {
        tag: String,
        expected: String,
        position: Option<Position>,
    },

    #[error("unknown tag !{tag}{}", At(.position))]
    UnknownTag {
        tag: String,
        position: Option<Position>,
    },

    #[error("!{tag}: {reason}{}", At(.position))]
    UnsupportedOption {
        tag: String,
        reason: String,
        position: Option<Position>,
    },

    /// Mapping or scalar content that no marker is involved in.
    #[error("invalid document: {reason}{}", At(.position))]
    Document {
        reason: String,
        position: Option<Position>,
    },

    #[error("include cycle detected: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    #[error("included file not found: {}", .path.display())]
    IncludeNotFound { path: PathBuf },

    #[error("version unavailable: {reason}")]
    VersionUnavailable { reason: String },

    #[error("rule #{index} {rule:?}: {reason}")]
    RuleSyntax {
        index: usize,
        rule: String,
        reason: String,
    },

    #[error("rule #{index} {rule:?}: {reason}")]
    RuleEvaluation {
        index: usize,
        rule: String,
        reason: String,
    },

    #[error("read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse input: {0}")]
    Parse(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Fills in the source position on positioned variants that lack one.
    pub(crate) fn with_position(mut self, pos: Option<Position>) -> Self {
        match &mut self {
            Error::TagValidation { position, .. }
            | Error::UnknownTag { position, .. }
            | Error::UnsupportedOption { position, .. }
            | Error::Document { position, .. } => {
                if position.is_none() {
                    *position = pos;
                }
            }
            _ => {}
        }
        self
    }
}
