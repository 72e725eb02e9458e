use anyhow::Result;
use roaring::RoaringBitmap;

/// Immutable set of matching documents and the set algebra pivots are built on.
///
/// Implementations must be cheap to share across threads: independent pivots
/// and refinement branches are computed against the same base set.
pub trait DocSet: Clone + Send + Sync {
  fn len(&self) -> u64;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn intersect(&self, other: &Self) -> Self;

  /// Documents of `self` that are not in `other`.
  fn and_not(&self, other: &Self) -> Self;

  fn intersection_len(&self, other: &Self) -> u64 {
    self.intersect(other).len()
  }

  fn and_not_len(&self, other: &Self) -> u64 {
    self.len() - self.intersection_len(other)
  }
}

impl DocSet for RoaringBitmap {
  fn len(&self) -> u64 {
    RoaringBitmap::len(self)
  }

  fn is_empty(&self) -> bool {
    RoaringBitmap::is_empty(self)
  }

  fn intersect(&self, other: &Self) -> Self {
    self & other
  }

  fn and_not(&self, other: &Self) -> Self {
    self - other
  }

  fn intersection_len(&self, other: &Self) -> u64 {
    RoaringBitmap::intersection_len(self, other)
  }

  fn and_not_len(&self, other: &Self) -> u64 {
    RoaringBitmap::difference_len(self, other)
  }
}

/// Query-addressable view of an index that pivots count against.
///
/// Terms are raw indexed values; presenting them to callers is the job of
/// [`crate::SchemaLookup`].
pub trait FacetSource: Send + Sync {
  type Set: DocSet;

  /// Documents holding `term` in `field`. Unknown terms yield an empty set.
  fn term_docs(&self, field: &str, term: &str) -> Result<Self::Set>;

  /// Documents holding any value in `field`.
  fn field_docs(&self, field: &str) -> Result<Self::Set>;

  /// Every distinct term of `field` present in `subset`, with its document
  /// count, in ascending term order. Terms absent from `subset` are skipped.
  fn term_counts(&self, field: &str, subset: &Self::Set) -> Result<Vec<(String, u64)>>;
}
