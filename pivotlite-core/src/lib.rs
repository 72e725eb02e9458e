//! pivotlite-core: pivot facet engine.
//! Breaks a document set down by an ordered list of fields into a nested count
//! tree, and recomputes single branches for cross-shard refinement.

pub mod api;
pub mod docset;
mod index;
pub mod query;

/// Document identifier within an index.
pub type DocId = u32;

pub use docset::{DocSet, FacetSource};
pub use index::manifest::{FieldKind, KeywordField, NumericField, Schema, SchemaLookup};
pub use index::Index;
