//! Rule-driven filtering of OpenAPI specifications.
//!
//! A rule is `selector : action : predicate`, for example
//! `pathMethod : delete : resource.security == 'oauth2'`. Predicates are
//! parsed into a small AST and interpreted; nothing is ever handed to a
//! general-purpose evaluator.

pub mod eval;
pub mod expr;
pub mod filter;
pub mod rule;

pub use filter::{Format, HTTP_METHODS, OutputFormat, apply_rules, load_spec, process_openapi, render};
pub use rule::{Action, Rule, Selector, parse_rules};
