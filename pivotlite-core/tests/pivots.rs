use std::collections::BTreeMap;

use anyhow::anyhow;
use pivotlite_core::api::builder::IndexBuilder;
use pivotlite_core::api::types::{
  Document, FacetSort, FieldParams, Filter, PivotConfig, PivotNode, PivotParams, PivotRequest,
  PivotSpec, PivotValue, Schema, TermKey,
};
use pivotlite_core::api::{Index, PivotError};
use pivotlite_core::query::pivot::{encode_path, PivotProcessor};
use pivotlite_core::FacetSource;
use roaring::RoaringBitmap;
use serde_json::json;

fn doc(fields: Vec<(&str, serde_json::Value)>) -> Document {
  let mut map = BTreeMap::new();
  for (k, v) in fields {
    map.insert(k.to_string(), v);
  }
  Document { fields: map }
}

fn build_index() -> Index {
  let schema = Schema::default()
    .with_keyword("color")
    .with_keyword("size")
    .with_keyword("tags")
    .with_numeric("year", true);
  let docs = [
    doc(vec![
      ("color", json!("red")),
      ("size", json!("S")),
      ("year", json!(2020)),
      ("tags", json!(["sale", "new"])),
    ]),
    doc(vec![
      ("color", json!("red")),
      ("size", json!("M")),
      ("year", json!(2021)),
    ]),
    doc(vec![
      ("color", json!("red")),
      ("size", json!("M")),
      ("year", json!(2021)),
      ("tags", json!(["sale"])),
    ]),
    doc(vec![("color", json!("blue")), ("size", json!("M"))]),
    doc(vec![
      ("color", json!("blue")),
      ("size", json!("M")),
      ("year", json!(2020)),
    ]),
    doc(vec![("size", json!("L")), ("tags", json!(["new"]))]),
  ];
  IndexBuilder::from_documents(schema, docs.iter()).expect("build index")
}

fn request(pivots: Vec<PivotSpec>, params: PivotParams) -> PivotRequest {
  PivotRequest {
    pivots,
    params,
    filters: Vec::new(),
  }
}

fn summary(nodes: &[PivotNode]) -> Vec<(serde_json::Value, u64)> {
  nodes
    .iter()
    .map(|n| (serde_json::to_value(&n.value).unwrap(), n.count))
    .collect()
}

#[test]
fn single_field_pivot_includes_missing() {
  let idx = build_index();
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("color")], PivotParams::default()),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = resp.pivots.get("color").unwrap();
  assert_eq!(
    summary(nodes),
    vec![(json!("red"), 3), (json!("blue"), 2), (json!(null), 1)]
  );
  assert!(nodes.iter().all(|n| n.field == "color" && n.pivot.is_none()));

  let rendered = serde_json::to_value(&resp).unwrap();
  assert_eq!(
    rendered,
    json!({
      "pivots": {
        "color": [
          {"field": "color", "value": "red", "count": 3},
          {"field": "color", "value": "blue", "count": 2},
          {"field": "color", "value": null, "count": 1}
        ]
      }
    })
  );
}

#[test]
fn child_threshold_uses_child_field() {
  let idx = build_index();
  let params = PivotParams::default().with_mincount("size", 2);
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("color,size")], params),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = resp.pivots.get("color,size").unwrap();
  assert_eq!(nodes[0].value, PivotValue::from("red"));
  assert_eq!(summary(nodes[0].children()), vec![(json!("M"), 2)]);
  assert_eq!(nodes[1].value, PivotValue::from("blue"));
  assert_eq!(summary(nodes[1].children()), vec![(json!("M"), 2)]);
  // The parent level keeps the default threshold.
  assert_eq!(nodes.len(), 3);
}

#[test]
fn parent_threshold_prunes_whole_subtrees() {
  let idx = build_index();
  let params = PivotParams::default().with_mincount("color", 3);
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("color,size")], params),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = resp.pivots.get("color,size").unwrap();
  assert_eq!(summary(nodes), vec![(json!("red"), 3)]);
  assert_eq!(
    summary(nodes[0].children()),
    vec![(json!("M"), 2), (json!("S"), 1)]
  );
}

#[test]
fn refinement_matches_full_tree_counts() {
  let idx = build_index();
  let params = PivotParams::default().with_mincount("size", 2);
  let config = PivotConfig::default();
  let full = idx
    .pivot(
      &request(vec![PivotSpec::parse("color,size")], params.clone()),
      &config,
    )
    .unwrap();
  let full_red = &full.pivots.get("color,size").unwrap()[0];
  let full_red_m = &full_red.children()[0];

  let token = encode_path(&[TermKey::term("red"), TermKey::term("M")]);
  let refined = idx
    .pivot(
      &request(
        vec![PivotSpec::parse("color,size").with_refinement(token)],
        params,
      ),
      &config,
    )
    .unwrap();
  let nodes = refined.pivots.get("color,size").unwrap();
  assert_eq!(nodes.len(), 1);
  assert_eq!(nodes[0].value, full_red.value);
  assert_eq!(nodes[0].count, full_red.count);
  assert_eq!(nodes[0].children(), std::slice::from_ref(full_red_m));
  assert!(refined.failures.is_empty());
}

#[test]
fn multiple_refinements_append_under_one_key() {
  let idx = build_index();
  let spec = PivotSpec::parse("color,size")
    .with_key("cs")
    .with_refinement("~blue")
    .with_refinement(encode_path(&[TermKey::Missing, TermKey::term("L")]));
  let resp = idx
    .pivot(
      &request(vec![spec], PivotParams::default()),
      &PivotConfig::default(),
    )
    .unwrap();
  assert_eq!(resp.pivots.keys().collect::<Vec<_>>(), vec!["cs"]);
  let nodes = resp.pivots.get("cs").unwrap();
  assert_eq!(summary(nodes), vec![(json!("blue"), 2), (json!(null), 1)]);
  assert_eq!(summary(nodes[0].children()), vec![(json!("M"), 2)]);
  assert_eq!(summary(nodes[1].children()), vec![(json!("L"), 1)]);
}

#[test]
fn empty_field_list_is_rejected() {
  let idx = build_index();
  let err = idx
    .pivot(
      &request(vec![PivotSpec::new(Vec::<String>::new())], PivotParams::default()),
      &PivotConfig::default(),
    )
    .unwrap_err();
  assert!(matches!(err, PivotError::EmptyFieldList { .. }), "{err}");
}

#[test]
fn unknown_field_rejects_request_before_building() {
  let idx = build_index();
  let err = idx
    .pivot(
      &request(
        vec![PivotSpec::parse("color"), PivotSpec::parse("bogus")],
        PivotParams::default(),
      ),
      &PivotConfig::default(),
    )
    .unwrap_err();
  match err {
    PivotError::BadField { field, pivot, .. } => {
      assert_eq!(field, "bogus");
      assert_eq!(pivot, "bogus");
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn repeated_field_builds_nested_levels() {
  let idx = build_index();
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("color,color")], PivotParams::default()),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = resp.pivots.get("color,color").unwrap();
  assert_eq!(
    summary(nodes),
    vec![(json!("red"), 3), (json!("blue"), 2), (json!(null), 1)]
  );
  assert_eq!(summary(nodes[0].children()), vec![(json!("red"), 3)]);
  assert_eq!(summary(nodes[1].children()), vec![(json!("blue"), 2)]);
  assert_eq!(summary(nodes[2].children()), vec![(json!(null), 1)]);
}

#[test]
fn too_deep_pivot_is_rejected() {
  let idx = build_index();
  let config = PivotConfig {
    max_depth: 2,
    ..PivotConfig::default()
  };
  let err = idx
    .pivot(
      &request(
        vec![PivotSpec::parse("color,size,year")],
        PivotParams::default(),
      ),
      &config,
    )
    .unwrap_err();
  assert!(matches!(err, PivotError::TooDeep { depth: 3, .. }), "{err}");
}

#[test]
fn malformed_refinement_only_fails_its_token() {
  let idx = build_index();
  let pivots = vec![
    PivotSpec::parse("color,size")
      .with_refinement("~red\\")
      .with_refinement("~red,~M,~extra")
      .with_refinement("~blue"),
    PivotSpec::parse("size"),
  ];
  let resp = idx
    .pivot(
      &request(pivots, PivotParams::default()),
      &PivotConfig::default(),
    )
    .unwrap();
  assert_eq!(resp.failures.len(), 2);
  assert!(resp
    .failures
    .iter()
    .all(|f| f.key == "color,size" && matches!(f.error, PivotError::MalformedPath { .. })));
  assert_eq!(resp.failures[0].token, "~red\\");
  assert_eq!(
    summary(resp.pivots.get("color,size").unwrap()),
    vec![(json!("blue"), 2)]
  );
  assert_eq!(
    summary(resp.pivots.get("size").unwrap()),
    vec![(json!("M"), 4), (json!("L"), 1), (json!("S"), 1)]
  );
  let rendered = serde_json::to_value(&resp).unwrap();
  assert_eq!(rendered["failures"][0]["key"], json!("color,size"));
  assert!(rendered["failures"][0]["error"]
    .as_str()
    .unwrap()
    .contains("dangling escape"));
}

#[test]
fn numeric_and_multi_valued_fields() {
  let idx = build_index();
  let params = PivotParams::default().with_field(
    "year",
    FieldParams {
      sort: FacetSort::Index,
      missing: false,
      ..FieldParams::default()
    },
  );
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("tags,year")], params),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = resp.pivots.get("tags,year").unwrap();
  // Ties on count fall back to ascending term order.
  assert_eq!(
    summary(nodes),
    vec![(json!("new"), 2), (json!("sale"), 2), (json!(null), 3)]
  );
  assert_eq!(summary(nodes[0].children()), vec![(json!(2020), 1)]);
  assert_eq!(
    summary(nodes[1].children()),
    vec![(json!(2020), 1), (json!(2021), 1)]
  );
  assert_eq!(
    summary(nodes[2].children()),
    vec![(json!(2020), 1), (json!(2021), 1)]
  );

  // A presented numeric value converts back into a usable refinement term.
  let year_term = nodes[1].children()[1].value.refinement_term();
  let token = encode_path(&[TermKey::term("sale"), year_term]);
  let refined = idx
    .pivot(
      &request(
        vec![PivotSpec::parse("tags,year").with_refinement(token)],
        PivotParams::default(),
      ),
      &PivotConfig::default(),
    )
    .unwrap();
  let nodes = refined.pivots.get("tags,year").unwrap();
  assert_eq!(summary(nodes[0].children()), vec![(json!(2021), 1)]);
}

#[test]
fn limit_offset_and_missing_flag() {
  let idx = build_index();
  let params = PivotParams {
    defaults: FieldParams {
      limit: Some(1),
      offset: 1,
      missing: false,
      ..FieldParams::default()
    },
    fields: BTreeMap::new(),
  };
  let resp = idx
    .pivot(
      &request(vec![PivotSpec::parse("size")], params),
      &PivotConfig::default(),
    )
    .unwrap();
  assert_eq!(
    summary(resp.pivots.get("size").unwrap()),
    vec![(json!("L"), 1)]
  );
}

#[test]
fn filters_narrow_the_base_set() {
  let idx = build_index();
  let mut req = request(vec![PivotSpec::parse("color")], PivotParams::default());
  req.filters = vec![Filter::KeywordEq {
    field: "size".into(),
    value: "M".into(),
  }];
  let resp = idx.pivot(&req, &PivotConfig::default()).unwrap();
  assert_eq!(
    summary(resp.pivots.get("color").unwrap()),
    vec![(json!("blue"), 2), (json!("red"), 2)]
  );
}

#[test]
fn parallel_and_sequential_agree() {
  let idx = build_index();
  let pivots = vec![
    PivotSpec::parse("color,size,year"),
    PivotSpec::parse("size,color").with_refinement("~M"),
    PivotSpec::parse("size,color").with_refinement("~L,^"),
    PivotSpec::parse("tags"),
  ];
  let req = request(pivots, PivotParams::default());
  let sequential = idx.pivot(&req, &PivotConfig::default()).unwrap();
  let parallel = idx
    .pivot(
      &req,
      &PivotConfig {
        parallel: true,
        ..PivotConfig::default()
      },
    )
    .unwrap();
  assert_eq!(sequential.pivots, parallel.pivots);
  assert_eq!(
    parallel.pivots.keys().collect::<Vec<_>>(),
    vec!["color,size,year", "size,color", "tags"]
  );
  assert_eq!(parallel.pivots.get("size,color").unwrap().len(), 2);
}

struct FailingSource;

impl FacetSource for FailingSource {
  type Set = RoaringBitmap;

  fn term_docs(&self, _field: &str, _term: &str) -> anyhow::Result<RoaringBitmap> {
    Err(anyhow!("segment unavailable"))
  }

  fn field_docs(&self, _field: &str) -> anyhow::Result<RoaringBitmap> {
    Err(anyhow!("segment unavailable"))
  }

  fn term_counts(
    &self,
    _field: &str,
    _subset: &RoaringBitmap,
  ) -> anyhow::Result<Vec<(String, u64)>> {
    Err(anyhow!("segment unavailable"))
  }
}

#[test]
fn source_failures_propagate() {
  let schema = Schema::default().with_keyword("color");
  let params = PivotParams::default();
  let config = PivotConfig::default();
  let processor = PivotProcessor::new(&FailingSource, &schema, &params, &config);
  let base: RoaringBitmap = (0..4).collect();
  let err = processor
    .process(&base, &[PivotSpec::parse("color")])
    .unwrap_err();
  assert!(matches!(err, PivotError::Source(_)));
  assert_eq!(err.to_string(), "segment unavailable");
}
