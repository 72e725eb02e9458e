use std::ops::Deref;

use log::{debug, warn};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::api::errors::PivotError;
use crate::api::types::{
  PivotConfig, PivotFacets, PivotNode, PivotParams, PivotResponse, PivotSpec, RefinementFailure,
  TermKey,
};
use crate::docset::FacetSource;
use crate::index::manifest::SchemaLookup;
use crate::query::pivot::builder::PivotTreeBuilder;
use crate::query::pivot::path::decode_path;

/// A validated, non-empty pivot field list: every field known to the schema,
/// no longer than the configured depth. A field may appear at several levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSequence(SmallVec<[String; 4]>);

impl FieldSequence {
  pub fn new<L: SchemaLookup + ?Sized>(
    spec: &PivotSpec,
    schema: &L,
    max_depth: usize,
  ) -> Result<Self, PivotError> {
    let pivot = spec.canonical();
    if spec.fields.is_empty() {
      return Err(PivotError::EmptyFieldList { pivot });
    }
    if spec.fields.len() > max_depth {
      return Err(PivotError::TooDeep {
        pivot,
        depth: spec.fields.len(),
        max_depth,
      });
    }
    if let Some(field) = spec.fields.iter().find(|f| !schema.field_exists(f)) {
      return Err(PivotError::BadField {
        field: field.clone(),
        pivot,
        reason: "not a valid field name".into(),
      });
    }
    Ok(Self(spec.fields.iter().cloned().collect()))
  }
}

impl Deref for FieldSequence {
  type Target = [String];

  fn deref(&self) -> &[String] {
    &self.0
  }
}

/// One independent tree computation: a whole pivot, or one refinement branch.
struct PivotUnit {
  key: String,
  fields: FieldSequence,
  path: Vec<TermKey>,
}

/// Validates the pivots of a request and assembles one tree per pivot (or
/// per refinement branch) into the response.
pub struct PivotProcessor<'a, S: FacetSource, L: SchemaLookup> {
  source: &'a S,
  schema: &'a L,
  params: &'a PivotParams,
  config: &'a PivotConfig,
}

impl<'a, S: FacetSource, L: SchemaLookup> PivotProcessor<'a, S, L> {
  pub fn new(
    source: &'a S,
    schema: &'a L,
    params: &'a PivotParams,
    config: &'a PivotConfig,
  ) -> Self {
    Self {
      source,
      schema,
      params,
      config,
    }
  }

  pub fn validate(&self, spec: &PivotSpec) -> Result<FieldSequence, PivotError> {
    FieldSequence::new(spec, self.schema, self.config.max_depth)
  }

  /// Decodes one refinement token and checks it fits `fields`.
  pub fn decode_refinement(
    &self,
    fields: &FieldSequence,
    token: &str,
  ) -> Result<Vec<TermKey>, PivotError> {
    let path = decode_path(token)?;
    if path.is_empty() {
      return Err(PivotError::malformed(token, "refinement path is empty"));
    }
    if path.len() > fields.len() {
      return Err(PivotError::malformed(
        token,
        format!(
          "{} values for a pivot of {} fields",
          path.len(),
          fields.len()
        ),
      ));
    }
    Ok(path)
  }

  /// Computes every pivot of a request over `base`.
  ///
  /// All field lists are validated before any counting starts; a bad field
  /// list rejects the whole request. A refinement token that fails to decode
  /// is reported in [`PivotResponse::failures`] and the rest still runs.
  pub fn process(
    &self,
    base: &S::Set,
    pivots: &[PivotSpec],
  ) -> Result<PivotResponse, PivotError> {
    let validated = pivots
      .iter()
      .map(|spec| self.validate(spec).map(|fields| (spec, fields)))
      .collect::<Result<Vec<_>, _>>()?;

    let mut units = Vec::new();
    let mut failures = Vec::new();
    for (spec, fields) in validated {
      let key = spec.response_key();
      if spec.refine.is_empty() {
        units.push(PivotUnit {
          key,
          fields,
          path: Vec::new(),
        });
        continue;
      }
      for token in spec.refine.iter() {
        match self.decode_refinement(&fields, token) {
          Ok(path) => {
            debug!("refining pivot `{key}` along `{token}`");
            units.push(PivotUnit {
              key: key.clone(),
              fields: fields.clone(),
              path,
            });
          }
          Err(error) => {
            warn!("rejecting refinement of pivot `{key}`: {error}");
            failures.push(RefinementFailure {
              key: key.clone(),
              token: token.clone(),
              error,
            });
          }
        }
      }
    }

    let builder = PivotTreeBuilder::new(self.source, self.schema, self.params);
    let build = |unit: &PivotUnit| -> Result<Vec<PivotNode>, PivotError> {
      debug!(
        "building pivot `{}` over {} fields",
        unit.key,
        unit.fields.len()
      );
      builder.build(base, &unit.fields, &unit.path)
    };
    let trees: Vec<Result<Vec<PivotNode>, PivotError>> = if self.config.parallel {
      units.par_iter().map(build).collect()
    } else {
      units.iter().map(build).collect()
    };

    let mut facets = PivotFacets::default();
    for (unit, tree) in units.into_iter().zip(trees) {
      facets.append(unit.key, tree?);
    }
    Ok(PivotResponse {
      pivots: facets,
      failures,
    })
  }
}
