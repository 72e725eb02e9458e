use roaring::RoaringBitmap;

use crate::api::types::Filter;
use crate::index::fastfields::FastFieldsReader;

/// Narrows `base` to the documents passing every filter.
pub fn filter_docs(
  reader: &FastFieldsReader,
  base: RoaringBitmap,
  filters: &[Filter],
) -> RoaringBitmap {
  filters
    .iter()
    .fold(base, |docs, f| apply_filter(reader, docs, f))
}

fn apply_filter(reader: &FastFieldsReader, docs: RoaringBitmap, filter: &Filter) -> RoaringBitmap {
  match filter {
    Filter::KeywordEq { field, value } => docs & reader.term_docs(field, value),
    Filter::KeywordIn { field, values } => {
      let matching = values
        .iter()
        .fold(RoaringBitmap::new(), |acc, v| acc | reader.term_docs(field, v));
      docs & matching
    }
    Filter::I64Range { field, min, max } => {
      docs & terms_matching(reader, field, |term| {
        term
          .parse::<i64>()
          .map(|v| v >= *min && v <= *max)
          .unwrap_or(false)
      })
    }
    Filter::F64Range { field, min, max } => {
      docs & terms_matching(reader, field, |term| {
        term
          .parse::<f64>()
          .map(|v| v >= *min && v <= *max)
          .unwrap_or(false)
      })
    }
    Filter::Exists { field } => docs & reader.field_docs(field),
    Filter::Missing { field } => docs - reader.field_docs(field),
  }
}

fn terms_matching(
  reader: &FastFieldsReader,
  field: &str,
  pred: impl Fn(&str) -> bool,
) -> RoaringBitmap {
  let mut out = RoaringBitmap::new();
  if let Some(column) = reader.column(field) {
    for (term, docs) in column.terms() {
      if pred(term) {
        out |= docs;
      }
    }
  }
  out
}
