//! `selector : action : predicate` rule strings.

use crate::error::{Error, Result};
use crate::openapi::eval::{self, Context};
use crate::openapi::expr::{self, Expr, ParseError};
use std::fmt;
use std::str::FromStr;

/// Which document element a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Each entry of `paths`; binds `path`.
    Path,
    /// Each operation under each path; binds `path`, `method` and `resource`.
    /// A path is dropped once a rule deletes its last operation. Path items
    /// that never had an operation (only `parameters`, say) are left alone.
    PathMethod,
}

impl Selector {
    pub fn bindings(self) -> &'static [&'static str] {
        match self {
            Selector::Path => &["path"],
            Selector::PathMethod => &["path", "method", "resource"],
        }
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "path" => Ok(Selector::Path),
            "pathMethod" | "path/method" => Ok(Selector::PathMethod),
            other => Err(format!(
                "unknown selector {:?} (expected path or pathMethod)",
                other
            )),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Path => f.write_str("path"),
            Selector::PathMethod => f.write_str("pathMethod"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action {:?} (expected delete)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: Selector,
    pub action: Action,
    pub source: String,
    pub predicate: Expr,
}

impl Rule {
    /// Parses one rule; `index` is its position in the pipeline (0-based)
    /// and is carried into errors.
    pub fn parse(index: usize, rule: &str) -> Result<Self> {
        let syntax = |reason: String| Error::RuleSyntax {
            index,
            rule: rule.to_string(),
            reason,
        };
        let unsupported = |reason: String| Error::RuleEvaluation {
            index,
            rule: rule.to_string(),
            reason,
        };

        let [selector, action, source] = split_rule(rule).map_err(syntax)?;
        let selector: Selector = selector.parse().map_err(syntax)?;
        let action: Action = action.parse().map_err(syntax)?;

        let predicate = expr::parse(source).map_err(|e| match e {
            ParseError::Syntax(reason) => syntax(reason),
            ParseError::Unsupported(reason) => unsupported(reason),
        })?;

        if let Some(name) = predicate
            .identifiers()
            .into_iter()
            .find(|name| !selector.bindings().contains(name))
        {
            return Err(unsupported(format!(
                "unknown name '{}' for selector {} (available: {})",
                name,
                selector,
                selector.bindings().join(", ")
            )));
        }

        Ok(Self {
            selector,
            action,
            source: source.to_string(),
            predicate,
        })
    }

    pub fn matches(&self, ctx: &Context<'_>) -> bool {
        eval::eval(&self.predicate, ctx).truthy()
    }
}

/// Splits on the first two colons that sit outside quoted literals.
fn split_rule(rule: &str) -> std::result::Result<[&str; 3], String> {
    let mut cuts = Vec::with_capacity(2);
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in rule.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ':' => {
                cuts.push(i);
                if cuts.len() == 2 {
                    break;
                }
            }
            None => {}
        }
    }

    let &[first, second] = cuts.as_slice() else {
        return Err("expected \"<selector> : <action> : <predicate>\"".to_string());
    };
    let parts = [
        rule[..first].trim(),
        rule[first + 1..second].trim(),
        rule[second + 1..].trim(),
    ];
    if parts[2].is_empty() {
        return Err("empty predicate".to_string());
    }
    Ok(parts)
}

/// Parses every rule up front so a bad rule fails before any document is
/// touched.
pub fn parse_rules<S: AsRef<str>>(rules: &[S]) -> Result<Vec<Rule>> {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| Rule::parse(index, rule.as_ref()))
        .collect()
}
