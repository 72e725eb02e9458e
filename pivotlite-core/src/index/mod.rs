use anyhow::Result;
use roaring::RoaringBitmap;

use crate::api::errors::PivotError;
use crate::api::types::{Filter, PivotConfig, PivotRequest, PivotResponse};
use crate::docset::FacetSource;
use crate::index::fastfields::FastFieldsReader;
use crate::index::manifest::{Schema, SchemaLookup};
use crate::query::filters::filter_docs;
use crate::query::pivot::PivotProcessor;

pub mod fastfields;
pub mod manifest;

/// Immutable in-memory facet index over keyword and numeric fields.
///
/// Built once through [`crate::api::IndexWriter`]; afterwards it is only read,
/// so a single instance can serve concurrent pivot computations.
pub struct Index {
  schema: Schema,
  fast_fields: FastFieldsReader,
  doc_count: u32,
}

impl Index {
  pub(crate) fn new(schema: Schema, fast_fields: FastFieldsReader, doc_count: u32) -> Self {
    Self {
      schema,
      fast_fields,
      doc_count,
    }
  }

  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  pub fn doc_count(&self) -> u32 {
    self.doc_count
  }

  pub fn all_docs(&self) -> RoaringBitmap {
    let mut docs = RoaringBitmap::new();
    docs.insert_range(0..self.doc_count);
    docs
  }

  /// Documents passing every filter; no filters means the whole index.
  pub fn filtered_docs(&self, filters: &[Filter]) -> RoaringBitmap {
    filter_docs(&self.fast_fields, self.all_docs(), filters)
  }

  /// Number of distinct terms indexed for `field`.
  pub fn term_count(&self, field: &str) -> usize {
    self
      .fast_fields
      .column(field)
      .map(|c| c.term_count())
      .unwrap_or(0)
  }

  /// Runs a pivot request over the documents matching its filters.
  pub fn pivot(
    &self,
    request: &PivotRequest,
    config: &PivotConfig,
  ) -> Result<PivotResponse, PivotError> {
    let base = self.filtered_docs(&request.filters);
    PivotProcessor::new(self, &self.schema, &request.params, config).process(&base, &request.pivots)
  }
}

impl FacetSource for Index {
  type Set = RoaringBitmap;

  fn term_docs(&self, field: &str, term: &str) -> Result<RoaringBitmap> {
    Ok(self.fast_fields.term_docs(field, term))
  }

  fn field_docs(&self, field: &str) -> Result<RoaringBitmap> {
    Ok(self.fast_fields.field_docs(field))
  }

  fn term_counts(&self, field: &str, subset: &RoaringBitmap) -> Result<Vec<(String, u64)>> {
    Ok(self.fast_fields.term_counts(field, subset))
  }
}

impl SchemaLookup for Index {
  fn field_exists(&self, name: &str) -> bool {
    self.schema.field_exists(name)
  }

  fn present_value(&self, field: &str, raw: &str) -> serde_json::Value {
    self.schema.present_value(field, raw)
  }
}
