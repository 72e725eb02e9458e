use anyhow::Result;

use crate::api::types::{FacetSort, FieldParams, TermKey};
use crate::docset::{DocSet, FacetSource};

/// Per-field counting over a [`FacetSource`]: full enumeration for building
/// trees, and single-value lookups for refinement.
pub struct TermCounter<'a, S: FacetSource> {
  source: &'a S,
}

impl<'a, S: FacetSource> Clone for TermCounter<'a, S> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<'a, S: FacetSource> Copy for TermCounter<'a, S> {}

impl<'a, S: FacetSource> TermCounter<'a, S> {
  pub fn new(source: &'a S) -> Self {
    Self { source }
  }

  /// Wide enumeration: every value of `field` in `subset`, ordered by
  /// `params.sort`, with `mincount`, `offset` and `limit` applied. When
  /// `params.missing` is set the missing pseudo-entry is appended last,
  /// whatever its count.
  pub fn counts_by_value(
    &self,
    field: &str,
    subset: &S::Set,
    params: &FieldParams,
  ) -> Result<Vec<(TermKey, u64)>> {
    let mut counts = self.source.term_counts(field, subset)?;
    match params.sort {
      FacetSort::Count => counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))),
      FacetSort::Index => counts.sort_by(|a, b| a.0.cmp(&b.0)),
    }
    let mut out: Vec<(TermKey, u64)> = counts
      .into_iter()
      .filter(|(_, count)| *count >= params.mincount)
      .skip(params.offset)
      .take(params.limit.unwrap_or(usize::MAX))
      .map(|(term, count)| (TermKey::Term(term), count))
      .collect();
    if params.missing {
      out.push((TermKey::Missing, self.missing_count(field, subset)?));
    }
    Ok(out)
  }

  /// Narrow lookup: the count of one value without enumerating the others.
  pub fn count_for_value(&self, field: &str, subset: &S::Set, value: &TermKey) -> Result<u64> {
    match value {
      TermKey::Term(term) => Ok(subset.intersection_len(&self.source.term_docs(field, term)?)),
      TermKey::Missing => self.missing_count(field, subset),
    }
  }

  /// Documents of `subset` holding any value for `field`.
  pub fn has_value_count(&self, field: &str, subset: &S::Set) -> Result<u64> {
    Ok(subset.intersection_len(&self.source.field_docs(field)?))
  }

  pub fn missing_count(&self, field: &str, subset: &S::Set) -> Result<u64> {
    Ok(subset.and_not_len(&self.source.field_docs(field)?))
  }

  /// The part of `subset` a node for `value` covers.
  pub fn subset_for(&self, field: &str, subset: &S::Set, value: &TermKey) -> Result<S::Set> {
    match value {
      TermKey::Term(term) => Ok(subset.intersect(&self.source.term_docs(field, term)?)),
      TermKey::Missing => Ok(subset.and_not(&self.source.field_docs(field)?)),
    }
  }
}
