//! Pivot facets: a hierarchical breakdown of a document set by an ordered
//! list of fields.
//!
//! - `path`: wire encoding of a single branch, used to request refinements.
//! - `counter`: wide (all values) and narrow (one value) counting.
//! - `builder`: recursive construction of the count tree.
//! - `processor`: validation and fan-out over the pivots of one request.

pub mod builder;
pub mod counter;
pub mod path;
pub mod processor;

pub use builder::PivotTreeBuilder;
pub use counter::TermCounter;
pub use path::{decode_path, encode_path};
pub use processor::{FieldSequence, PivotProcessor};

pub use crate::docset::FacetSource;
pub use crate::index::manifest::SchemaLookup;
