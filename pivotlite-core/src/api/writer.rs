use anyhow::{bail, Context, Result};
use log::debug;

use crate::api::types::Document;
use crate::index::fastfields::FastFieldsWriter;
use crate::index::manifest::{FieldKind, Schema};
use crate::index::Index;
use crate::DocId;

/// Accumulates documents into fast-field columns, then freezes them into an
/// [`Index`]. Document ids are assigned in insertion order.
pub struct IndexWriter {
  schema: Schema,
  fast_fields: FastFieldsWriter,
  next_doc: DocId,
}

impl IndexWriter {
  pub fn new(schema: Schema) -> Result<Self> {
    schema.validate_config()?;
    let mut fast_fields = FastFieldsWriter::new();
    for name in schema.field_names() {
      fast_fields.declare(name);
    }
    Ok(Self {
      schema,
      fast_fields,
      next_doc: 0,
    })
  }

  /// Indexes the schema fields of `doc`; fields the schema does not declare
  /// are ignored.
  pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
    let doc_id = self.next_doc;
    if doc_id == DocId::MAX {
      bail!("index is full ({} documents)", DocId::MAX);
    }
    let mut terms = Vec::new();
    for (field, value) in doc.fields.iter() {
      if self.schema.field_kind(field) == FieldKind::Unknown {
        continue;
      }
      let field_terms = self
        .schema
        .terms_for(field, value)
        .with_context(|| format!("indexing document {doc_id}"))?;
      terms.extend(field_terms.into_iter().map(|t| (field.as_str(), t)));
    }
    for (field, term) in terms.iter() {
      self.fast_fields.set(field, doc_id, term);
    }
    self.next_doc += 1;
    Ok(doc_id)
  }

  pub fn doc_count(&self) -> u32 {
    self.next_doc
  }

  pub fn finish(self) -> Index {
    debug!("sealing index with {} documents", self.next_doc);
    Index::new(self.schema, self.fast_fields.finish(), self.next_doc)
  }
}
