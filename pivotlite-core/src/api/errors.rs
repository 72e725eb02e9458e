use thiserror::Error;

#[derive(Debug, Error)]
pub enum PivotError {
  #[error("invalid field `{field}` in pivot `{pivot}`: {reason}")]
  BadField {
    field: String,
    pivot: String,
    reason: String,
  },

  #[error("pivot facet needs at least one field name: `{pivot}`")]
  EmptyFieldList { pivot: String },

  #[error("pivot `{pivot}` has {depth} fields (maximum depth is {max_depth})")]
  TooDeep {
    pivot: String,
    depth: usize,
    max_depth: usize,
  },

  #[error("malformed refinement path `{token}`: {reason}")]
  MalformedPath { token: String, reason: String },

  #[error(transparent)]
  Source(#[from] anyhow::Error),
}

impl PivotError {
  pub(crate) fn malformed(token: &str, reason: impl Into<String>) -> Self {
    PivotError::MalformedPath {
      token: token.to_string(),
      reason: reason.into(),
    }
  }
}
