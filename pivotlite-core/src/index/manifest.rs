use anyhow::{anyhow, bail, Result};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Schema collaborator consumed by the pivot engine: field validation and
/// presentation of raw indexed terms.
pub trait SchemaLookup: Send + Sync {
  fn field_exists(&self, name: &str) -> bool;

  /// Renders a raw indexed term of `field` as the value reported to callers.
  fn present_value(&self, field: &str, raw: &str) -> serde_json::Value;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Schema {
  #[serde(default)]
  pub keyword_fields: Vec<KeywordField>,
  #[serde(default)]
  pub numeric_fields: Vec<NumericField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordField {
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericField {
  pub name: String,
  #[serde(default)]
  pub i64: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Keyword,
  I64,
  F64,
  Unknown,
}

impl Schema {
  pub fn with_keyword(mut self, name: impl Into<String>) -> Self {
    self.keyword_fields.push(KeywordField { name: name.into() });
    self
  }

  pub fn with_numeric(mut self, name: impl Into<String>, i64: bool) -> Self {
    self.numeric_fields.push(NumericField {
      name: name.into(),
      i64,
    });
    self
  }

  pub fn field_kind(&self, field: &str) -> FieldKind {
    if self.keyword_fields.iter().any(|f| f.name == field) {
      return FieldKind::Keyword;
    }
    match self.numeric_fields.iter().find(|f| f.name == field) {
      Some(f) if f.i64 => FieldKind::I64,
      Some(_) => FieldKind::F64,
      None => FieldKind::Unknown,
    }
  }

  pub fn field_names(&self) -> impl Iterator<Item = &str> {
    self
      .keyword_fields
      .iter()
      .map(|f| f.name.as_str())
      .chain(self.numeric_fields.iter().map(|f| f.name.as_str()))
  }

  pub fn validate_config(&self) -> Result<()> {
    let mut seen = HashSet::new();
    for name in self.field_names() {
      if name.trim().is_empty() {
        bail!("schema contains a field with an empty name");
      }
      if !seen.insert(name) {
        bail!("field `{name}` is declared more than once");
      }
    }
    Ok(())
  }

  /// Extracts the indexed terms of one document field. Arrays index every
  /// element; `null` and empty arrays index nothing.
  pub fn terms_for(&self, field: &str, value: &serde_json::Value) -> Result<Vec<String>> {
    let kind = self.field_kind(field);
    let mut out = Vec::new();
    match value {
      serde_json::Value::Array(items) => {
        for item in items.iter() {
          if let Some(term) = scalar_term(kind, field, item)? {
            out.push(term);
          }
        }
      }
      other => {
        if let Some(term) = scalar_term(kind, field, other)? {
          out.push(term);
        }
      }
    }
    Ok(out)
  }
}

fn scalar_term(kind: FieldKind, field: &str, value: &serde_json::Value) -> Result<Option<String>> {
  use serde_json::Value;
  match (kind, value) {
    (_, Value::Null) => Ok(None),
    (FieldKind::Keyword, Value::String(s)) => Ok(Some(s.clone())),
    (FieldKind::Keyword, Value::Bool(b)) => Ok(Some(b.to_string())),
    (FieldKind::Keyword, Value::Number(n)) => Ok(Some(n.to_string())),
    (FieldKind::I64, Value::Number(n)) => n
      .as_i64()
      .map(|v| Some(v.to_string()))
      .ok_or_else(|| anyhow!("field `{field}` expects an integer, got {n}")),
    (FieldKind::I64, other @ (Value::String(_) | Value::Bool(_))) => {
      Err(anyhow!("field `{field}` expects an integer, got {other}"))
    }
    (FieldKind::F64, Value::Number(n)) => {
      let v = n
        .as_f64()
        .ok_or_else(|| anyhow!("field `{field}` expects a number, got {n}"))?;
      Ok(Some(f64_term(v)))
    }
    (FieldKind::Unknown, _) => Err(anyhow!("field `{field}` is not present in schema")),
    (_, other) => Err(anyhow!(
      "field `{field}` cannot index value {other} (expected {})",
      match kind {
        FieldKind::Keyword => "a keyword",
        _ => "a number",
      }
    )),
  }
}

/// Canonical term for a float: the same rendering serde_json uses, so a
/// presented value converts back to its exact indexed term.
pub(crate) fn f64_term(v: f64) -> String {
  serde_json::Number::from_f64(v)
    .map(|n| n.to_string())
    .unwrap_or_else(|| v.to_string())
}

impl SchemaLookup for Schema {
  fn field_exists(&self, name: &str) -> bool {
    self.field_kind(name) != FieldKind::Unknown
  }

  fn present_value(&self, field: &str, raw: &str) -> serde_json::Value {
    let parsed = match self.field_kind(field) {
      FieldKind::I64 => raw.parse::<i64>().ok().map(serde_json::Value::from),
      FieldKind::F64 => raw
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number),
      FieldKind::Keyword | FieldKind::Unknown => None,
    };
    parsed.unwrap_or_else(|| serde_json::Value::String(raw.to_string()))
  }
}
