use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::api::types::Document;
use crate::api::writer::IndexWriter;
use crate::index::manifest::Schema;
use crate::index::Index;

pub struct IndexBuilder;

impl IndexBuilder {
  pub fn from_documents<'a, I>(schema: Schema, docs: I) -> anyhow::Result<Index>
  where
    I: IntoIterator<Item = &'a Document>,
  {
    let mut writer = IndexWriter::new(schema)?;
    for doc in docs {
      writer.add_document(doc)?;
    }
    Ok(writer.finish())
  }

  /// Builds an index from newline-delimited JSON objects; blank lines are
  /// skipped.
  pub fn from_jsonl(schema: Schema, content: &str) -> anyhow::Result<Index> {
    let mut writer = IndexWriter::new(schema)?;
    for (line_no, line) in content.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let value: serde_json::Value = serde_json::from_str(line)
        .with_context(|| format!("invalid JSON on line {}", line_no + 1))?;
      let fields = match value {
        serde_json::Value::Object(obj) => obj.into_iter().collect(),
        _ => anyhow::bail!("line {} is not a JSON object", line_no + 1),
      };
      writer
        .add_document(&Document { fields })
        .with_context(|| format!("indexing line {}", line_no + 1))?;
    }
    Ok(writer.finish())
  }

  pub fn create_from_files(schema_path: &Path, docs_path: &Path) -> anyhow::Result<Index> {
    let data = fs::read_to_string(schema_path)
      .with_context(|| format!("reading schema file {:?}", schema_path))?;
    let schema: Schema = serde_json::from_str(&data)
      .with_context(|| format!("parsing schema file {:?}", schema_path))?;
    let docs = fs::read_to_string(docs_path)
      .with_context(|| format!("reading documents from {:?}", docs_path))?;
    Self::from_jsonl(schema, &docs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn creates_index_from_files() {
    let dir = tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    let docs_path = dir.path().join("docs.jsonl");
    let schema = Schema::default().with_keyword("color");
    fs::write(&schema_path, serde_json::to_string(&schema).unwrap()).unwrap();
    fs::write(&docs_path, "{\"color\":\"red\"}\n\n{\"color\":\"blue\"}\n").unwrap();
    let idx = IndexBuilder::create_from_files(&schema_path, &docs_path).unwrap();
    assert_eq!(idx.doc_count(), 2);
    assert_eq!(idx.term_count("color"), 2);
  }

  #[test]
  fn reports_bad_lines() {
    let schema = Schema::default().with_keyword("color");
    let err = IndexBuilder::from_jsonl(schema.clone(), "{\"color\":\"red\"}\n[1]\n")
      .err()
      .unwrap();
    assert!(err.to_string().contains("line 2"));
    let err = IndexBuilder::from_jsonl(schema, "{not json}").err().unwrap();
    assert!(err.to_string().contains("invalid JSON on line 1"));
  }
}
