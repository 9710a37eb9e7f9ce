//! Tagged document tree: data model, marker registry, loader and dumper.

pub mod dump;
pub mod load;
pub mod registry;
pub mod value;

pub use dump::{References, dump_document, dump_flow, dump_json};
pub use load::{load_document, load_document_file, load_json};
pub use registry::Registry;
pub use value::{Mapping, Marker, Tag, Value};
