//! CloudFormation template and OpenAPI specification processing.
//!
//! - [`tree`] loads YAML with the CloudFormation tag vocabulary into a
//!   [`Value`] tree and dumps it back, optionally expanding `!Ref`-style
//!   shorthand into `Ref:` / `Fn::*` mappings.
//! - [`directive`] resolves the `!CFNTools*` tags (file includes, string
//!   conversion, uuid, version, timestamp and checksum) in a loaded tree.
//! - [`openapi`] deletes paths and operations from an OpenAPI document
//!   according to `selector : action : predicate` rules.

pub mod directive;
pub mod error;
pub mod logging;
pub mod openapi;
pub mod tree;

pub use directive::EvalEnv;
pub use error::{Error, Position, Result};
pub use tree::{Marker, References, Tag, Value};

use std::path::Path;

/// Loads a template file, resolves its directives and dumps it as YAML.
pub fn process_template(path: impl AsRef<Path>, env: &EvalEnv, refs: References) -> Result<String> {
    let resolved = directive::evaluate_file(path, env)?;
    tree::dump_document(&resolved, refs)
}
