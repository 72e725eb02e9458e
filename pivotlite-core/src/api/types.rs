use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::api::errors::PivotError;

pub use crate::index::manifest::{FieldKind, KeywordField, NumericField, Schema, SchemaLookup};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
  pub fields: BTreeMap<String, serde_json::Value>,
}

/// Restricts the base document set a pivot request is computed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Filter {
  KeywordEq { field: String, value: String },
  KeywordIn { field: String, values: Vec<String> },
  I64Range { field: String, min: i64, max: i64 },
  F64Range { field: String, min: f64, max: f64 },
  Exists { field: String },
  Missing { field: String },
}

/// A raw indexed field value, or the pseudo-value for documents without one.
///
/// Refinement paths and term counts are expressed in these; [`PivotValue`] is
/// the presented form that ends up in responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKey {
  Term(String),
  Missing,
}

impl TermKey {
  pub fn term(value: impl Into<String>) -> Self {
    TermKey::Term(value.into())
  }

  pub fn as_term(&self) -> Option<&str> {
    match self {
      TermKey::Term(t) => Some(t.as_str()),
      TermKey::Missing => None,
    }
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, TermKey::Missing)
  }
}

impl From<Option<String>> for TermKey {
  fn from(value: Option<String>) -> Self {
    value.map(TermKey::Term).unwrap_or(TermKey::Missing)
  }
}

impl fmt::Display for TermKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TermKey::Term(t) => f.write_str(t),
      TermKey::Missing => f.write_str("(missing)"),
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacetSort {
  /// Highest count first, ties broken by ascending term.
  #[default]
  Count,
  /// Ascending term order.
  Index,
}

/// Per-field facet parameters applied at the pivot level that field occupies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldParams {
  /// Minimum document count for a value (and its subtree) to be emitted.
  pub mincount: u64,
  pub limit: Option<usize>,
  pub offset: usize,
  pub sort: FacetSort,
  /// Include the missing pseudo-entry when enumerating all values.
  pub missing: bool,
}

impl Default for FieldParams {
  fn default() -> Self {
    Self {
      mincount: 1,
      limit: None,
      offset: 0,
      sort: FacetSort::Count,
      missing: true,
    }
  }
}

/// Request-wide field parameters with per-field overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PivotParams {
  pub defaults: FieldParams,
  pub fields: BTreeMap<String, FieldParams>,
}

impl PivotParams {
  pub fn for_field(&self, field: &str) -> &FieldParams {
    self.fields.get(field).unwrap_or(&self.defaults)
  }

  pub fn mincount(&self, field: &str) -> u64 {
    self.for_field(field).mincount
  }

  pub fn with_field(mut self, field: impl Into<String>, params: FieldParams) -> Self {
    self.fields.insert(field.into(), params);
    self
  }

  pub fn with_mincount(mut self, field: impl Into<String>, mincount: u64) -> Self {
    let defaults = self.defaults.clone();
    self.fields.entry(field.into()).or_insert(defaults).mincount = mincount;
    self
  }
}

/// One requested pivot: an ordered field list plus optional refinement tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PivotSpec {
  pub fields: Vec<String>,
  #[serde(default)]
  pub key: Option<String>,
  /// Encoded branch paths; when non-empty only these branches are computed.
  #[serde(default)]
  pub refine: Vec<String>,
}

impl PivotSpec {
  pub fn new<I, S>(fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      fields: fields.into_iter().map(Into::into).collect(),
      key: None,
      refine: Vec::new(),
    }
  }

  /// Parses a comma separated field list such as `"color, size"`.
  pub fn parse(list: &str) -> Self {
    Self::new(
      list
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string),
    )
  }

  pub fn with_key(mut self, key: impl Into<String>) -> Self {
    self.key = Some(key.into());
    self
  }

  pub fn with_refinement(mut self, token: impl Into<String>) -> Self {
    self.refine.push(token.into());
    self
  }

  /// Canonical field list, used to name the pivot in errors and responses.
  pub fn canonical(&self) -> String {
    self.fields.join(",")
  }

  pub fn response_key(&self) -> String {
    self.key.clone().unwrap_or_else(|| self.canonical())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PivotRequest {
  pub pivots: Vec<PivotSpec>,
  #[serde(default)]
  pub params: PivotParams,
  #[serde(default)]
  pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PivotConfig {
  /// Longest field list a pivot may request.
  pub max_depth: usize,
  /// Compute independent pivots and refinement branches on the rayon pool.
  pub parallel: bool,
}

impl Default for PivotConfig {
  fn default() -> Self {
    Self {
      max_depth: 16,
      parallel: false,
    }
  }
}

/// Presented value of a pivot node; serialized as the bare value, or `null`
/// for missing.
#[derive(Debug, Clone, PartialEq)]
pub enum PivotValue {
  Value(serde_json::Value),
  Missing,
}

impl PivotValue {
  pub fn is_missing(&self) -> bool {
    matches!(self, PivotValue::Missing)
  }

  /// Raw term to use when encoding a refinement path through this node.
  pub fn refinement_term(&self) -> TermKey {
    match self {
      PivotValue::Value(serde_json::Value::String(s)) => TermKey::Term(s.clone()),
      PivotValue::Value(other) => TermKey::Term(other.to_string()),
      PivotValue::Missing => TermKey::Missing,
    }
  }
}

impl From<&str> for PivotValue {
  fn from(value: &str) -> Self {
    PivotValue::Value(serde_json::Value::String(value.to_string()))
  }
}

impl Serialize for PivotValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      PivotValue::Value(v) => v.serialize(serializer),
      PivotValue::Missing => serializer.serialize_none(),
    }
  }
}

impl<'de> Deserialize<'de> for PivotValue {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(if value.is_null() {
      PivotValue::Missing
    } else {
      PivotValue::Value(value)
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotNode {
  pub field: String,
  pub value: PivotValue,
  pub count: u64,
  /// Next level down. `None` when no deeper field was requested, or when the
  /// next level had nothing to enumerate.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pivot: Option<Vec<PivotNode>>,
}

impl PivotNode {
  pub fn children(&self) -> &[PivotNode] {
    self.pivot.as_deref().unwrap_or(&[])
  }

  /// Depth of the subtree rooted here, counting this node.
  pub fn depth(&self) -> usize {
    1 + self
      .children()
      .iter()
      .map(PivotNode::depth)
      .max()
      .unwrap_or(0)
  }
}

/// Pivot trees keyed by response key, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotFacets {
  entries: Vec<(String, Vec<PivotNode>)>,
}

impl PivotFacets {
  /// Appends `nodes` under `key`, extending an existing entry with that key.
  pub fn append(&mut self, key: String, nodes: Vec<PivotNode>) {
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, existing)) => existing.extend(nodes),
      None => self.entries.push((key, nodes)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&[PivotNode]> {
    self
      .entries
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, nodes)| nodes.as_slice())
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }
}

impl Serialize for PivotFacets {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (key, nodes) in self.entries.iter() {
      map.serialize_entry(key, nodes)?;
    }
    map.end()
  }
}

/// A refinement token that could not be computed. Other pivots and
/// refinements of the same request are unaffected.
#[derive(Debug, Serialize)]
pub struct RefinementFailure {
  pub key: String,
  pub token: String,
  #[serde(serialize_with = "serialize_error")]
  pub error: PivotError,
}

fn serialize_error<S: Serializer>(err: &PivotError, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(err)
}

#[derive(Debug, Default, Serialize)]
pub struct PivotResponse {
  pub pivots: PivotFacets,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failures: Vec<RefinementFailure>,
}
