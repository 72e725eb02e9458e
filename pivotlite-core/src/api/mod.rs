pub mod builder;
pub mod errors;
pub mod types;
pub mod writer;

pub use crate::index::Index;
pub use builder::IndexBuilder;
pub use errors::PivotError;
pub use types::{
  Document, FacetSort, FieldParams, Filter, PivotConfig, PivotFacets, PivotNode, PivotParams,
  PivotRequest, PivotResponse, PivotSpec, PivotValue, RefinementFailure, TermKey,
};
pub use writer::IndexWriter;
