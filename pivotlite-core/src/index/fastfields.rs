use std::collections::BTreeMap;

use hashbrown::HashMap;
use roaring::RoaringBitmap;

use crate::DocId;

/// Inverted column for one field: every term with the documents holding it,
/// plus the documents holding any value at all.
#[derive(Debug, Clone, Default)]
pub struct FastFieldColumn {
  terms: BTreeMap<String, RoaringBitmap>,
  present: RoaringBitmap,
}

impl FastFieldColumn {
  pub fn term_docs(&self, term: &str) -> Option<&RoaringBitmap> {
    self.terms.get(term)
  }

  pub fn present(&self) -> &RoaringBitmap {
    &self.present
  }

  pub fn terms(&self) -> impl Iterator<Item = (&str, &RoaringBitmap)> {
    self.terms.iter().map(|(t, docs)| (t.as_str(), docs))
  }

  pub fn term_count(&self) -> usize {
    self.terms.len()
  }
}

#[derive(Debug, Default)]
pub struct FastFieldsWriter {
  fields: HashMap<String, FastFieldColumn>,
}

impl FastFieldsWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, field: &str, doc_id: DocId, term: &str) {
    let column = self.fields.entry(field.to_string()).or_default();
    match column.terms.get_mut(term) {
      Some(docs) => {
        docs.insert(doc_id);
      }
      None => {
        let mut docs = RoaringBitmap::new();
        docs.insert(doc_id);
        column.terms.insert(term.to_string(), docs);
      }
    }
    column.present.insert(doc_id);
  }

  /// Registers a field so it reads back as an empty column even if no
  /// document ever sets it.
  pub fn declare(&mut self, field: &str) {
    self.fields.entry(field.to_string()).or_default();
  }

  pub fn finish(self) -> FastFieldsReader {
    FastFieldsReader {
      fields: self.fields,
    }
  }
}

#[derive(Debug, Default)]
pub struct FastFieldsReader {
  fields: HashMap<String, FastFieldColumn>,
}

impl FastFieldsReader {
  pub fn column(&self, field: &str) -> Option<&FastFieldColumn> {
    self.fields.get(field)
  }

  pub fn term_docs(&self, field: &str, term: &str) -> RoaringBitmap {
    self
      .column(field)
      .and_then(|c| c.term_docs(term))
      .cloned()
      .unwrap_or_default()
  }

  pub fn field_docs(&self, field: &str) -> RoaringBitmap {
    self
      .column(field)
      .map(|c| c.present().clone())
      .unwrap_or_default()
  }

  /// Counts every term of `field` within `subset`, skipping terms with no
  /// matches. Output is in ascending term order.
  pub fn term_counts(&self, field: &str, subset: &RoaringBitmap) -> Vec<(String, u64)> {
    let Some(column) = self.column(field) else {
      return Vec::new();
    };
    column
      .terms()
      .filter_map(|(term, docs)| {
        let count = docs.intersection_len(subset);
        (count > 0).then(|| (term.to_string(), count))
      })
      .collect()
  }
}
