use log::trace;

use crate::api::errors::PivotError;
use crate::api::types::{PivotNode, PivotParams, PivotValue, TermKey};
use crate::docset::FacetSource;
use crate::index::manifest::SchemaLookup;
use crate::query::pivot::counter::TermCounter;

/// Builds pivot trees for one request's parameters.
///
/// Holds only shared references, so one builder can serve several threads
/// building different pivots or branches over the same base set.
pub struct PivotTreeBuilder<'a, S: FacetSource, L: SchemaLookup> {
  counter: TermCounter<'a, S>,
  schema: &'a L,
  params: &'a PivotParams,
}

impl<'a, S: FacetSource, L: SchemaLookup> PivotTreeBuilder<'a, S, L> {
  pub fn new(source: &'a S, schema: &'a L, params: &'a PivotParams) -> Self {
    Self {
      counter: TermCounter::new(source),
      schema,
      params,
    }
  }

  /// Builds the level for `fields[0]` over `subset` and everything below it.
  ///
  /// With an empty `path` every value is enumerated (wide mode). Otherwise
  /// each level only computes the value `path` names for it (narrow mode)
  /// until the path runs out, and enumerates from there on.
  pub fn build(
    &self,
    subset: &S::Set,
    fields: &[String],
    path: &[TermKey],
  ) -> Result<Vec<PivotNode>, PivotError> {
    let Some(field) = fields.first() else {
      return Ok(Vec::new());
    };
    let counts = self.level_counts(subset, field, path)?;
    self.expand(subset, fields, path, counts)
  }

  fn level_counts(
    &self,
    subset: &S::Set,
    field: &str,
    path: &[TermKey],
  ) -> Result<Vec<(TermKey, u64)>, PivotError> {
    let counts = match path.first() {
      Some(value) => {
        let count = self.counter.count_for_value(field, subset, value)?;
        vec![(value.clone(), count)]
      }
      None => self
        .counter
        .counts_by_value(field, subset, self.params.for_field(field))?,
    };
    trace!(
      "pivot level `{field}`: {} candidate values ({})",
      counts.len(),
      if path.is_empty() { "wide" } else { "narrow" }
    );
    Ok(counts)
  }

  fn expand(
    &self,
    subset: &S::Set,
    fields: &[String],
    path: &[TermKey],
    counts: Vec<(TermKey, u64)>,
  ) -> Result<Vec<PivotNode>, PivotError> {
    let (field, rest) = match fields.split_first() {
      Some(split) => split,
      None => return Ok(Vec::new()),
    };
    let child_path = path.get(1..).unwrap_or(&[]);
    let mincount = self.params.mincount(field);

    let mut nodes = Vec::with_capacity(counts.len());
    for (value, count) in counts {
      if count < mincount {
        continue;
      }
      let pivot = match rest.first() {
        Some(child_field) => {
          let child_subset = self.counter.subset_for(field, subset, &value)?;
          let child_counts = self.level_counts(&child_subset, child_field, child_path)?;
          if child_counts.is_empty() {
            None
          } else {
            Some(self.expand(&child_subset, rest, child_path, child_counts)?)
          }
        }
        None => None,
      };
      nodes.push(PivotNode {
        field: field.clone(),
        value: self.present(field, &value),
        count,
        pivot,
      });
    }
    Ok(nodes)
  }

  fn present(&self, field: &str, value: &TermKey) -> PivotValue {
    match value {
      TermKey::Term(raw) => PivotValue::Value(self.schema.present_value(field, raw)),
      TermKey::Missing => PivotValue::Missing,
    }
  }
}
