use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use pivotlite_core::api::builder::IndexBuilder;
use pivotlite_core::api::types::{Filter, PivotConfig, PivotRequest, PivotSpec, TermKey};
use pivotlite_core::query::pivot::{decode_path, encode_path};

#[derive(Parser)]
#[command(name = "pivotlite", version, about = "Pivot facet counts over JSONL documents")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compute pivot facets over a document file
  Pivot {
    /// Schema JSON (keyword_fields / numeric_fields)
    #[arg(long)]
    schema: PathBuf,
    /// Documents, one JSON object per line
    #[arg(long)]
    docs: PathBuf,
    /// Full pivot request as JSON
    #[arg(long)]
    request: Option<PathBuf>,
    #[arg(long, conflicts_with = "request")]
    request_stdin: bool,
    /// Comma separated field list; repeat for several pivots
    #[arg(long = "pivot")]
    pivots: Vec<String>,
    /// Per-field threshold as FIELD=N; repeatable
    #[arg(long = "mincount")]
    mincounts: Vec<String>,
    /// Keyword equality filter as FIELD=VALUE; repeatable
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Engine configuration as JSON
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    parallel: bool,
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(long)]
    pretty: bool,
  },
  /// Encode a JSON array of values (null for missing) as a refinement path
  EncodePath { values: String },
  /// Decode a refinement path into a JSON array (null for missing)
  DecodePath { token: String },
}

struct PivotCliArgs {
  pivots: Vec<String>,
  mincounts: Vec<String>,
  filters: Vec<String>,
}

fn main() -> Result<()> {
  env_logger::init();
  let cli = Cli::parse();
  match cli.command {
    Commands::Pivot {
      schema,
      docs,
      request,
      request_stdin,
      pivots,
      mincounts,
      filters,
      config,
      parallel,
      max_depth,
      pretty,
    } => {
      let request = match read_request(request, request_stdin)? {
        Some(req) => req,
        None => build_pivot_request_from_cli(PivotCliArgs {
          pivots,
          mincounts,
          filters,
        })?,
      };
      let mut config = load_config(config.as_deref())?;
      if parallel {
        config.parallel = true;
      }
      if let Some(depth) = max_depth {
        config.max_depth = depth;
      }
      let out = cmd_pivot(schema.as_path(), docs.as_path(), &request, &config)?;
      let rendered = if pretty {
        serde_json::to_string_pretty(&out)?
      } else {
        serde_json::to_string(&out)?
      };
      println!("{rendered}");
      Ok(())
    }
    Commands::EncodePath { values } => {
      println!("{}", cmd_encode_path(&values)?);
      Ok(())
    }
    Commands::DecodePath { token } => {
      println!("{}", cmd_decode_path(&token)?);
      Ok(())
    }
  }
}

fn cmd_pivot(
  schema_path: &Path,
  docs_path: &Path,
  request: &PivotRequest,
  config: &PivotConfig,
) -> Result<serde_json::Value> {
  let index = IndexBuilder::create_from_files(schema_path, docs_path)?;
  info!(
    "loaded {} documents from {:?}",
    index.doc_count(),
    docs_path
  );
  let response = index.pivot(request, config)?;
  Ok(serde_json::to_value(&response)?)
}

fn cmd_encode_path(values: &str) -> Result<String> {
  let raw: Vec<serde_json::Value> =
    serde_json::from_str(values).context("parsing path values as a JSON array")?;
  let path = raw
    .into_iter()
    .map(|v| match v {
      serde_json::Value::Null => Ok(TermKey::Missing),
      serde_json::Value::String(s) => Ok(TermKey::Term(s)),
      serde_json::Value::Number(n) => Ok(TermKey::Term(n.to_string())),
      serde_json::Value::Bool(b) => Ok(TermKey::Term(b.to_string())),
      other => Err(anyhow!("unsupported path value {other}")),
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(encode_path(&path))
}

fn cmd_decode_path(token: &str) -> Result<String> {
  let values: Vec<Option<String>> = decode_path(token)?
    .into_iter()
    .map(|key| key.as_term().map(str::to_string))
    .collect();
  Ok(serde_json::to_string(&values)?)
}

fn build_pivot_request_from_cli(args: PivotCliArgs) -> Result<PivotRequest> {
  if args.pivots.is_empty() {
    bail!("pass --pivot at least once, or --request");
  }
  let mut request = PivotRequest {
    pivots: args.pivots.iter().map(|p| PivotSpec::parse(p)).collect(),
    ..PivotRequest::default()
  };
  for raw in args.mincounts.iter() {
    let (field, value) = split_assignment(raw, "--mincount")?;
    let mincount = value
      .parse::<u64>()
      .with_context(|| format!("invalid mincount `{value}` for field `{field}`"))?;
    request.params = request.params.with_mincount(field, mincount);
  }
  for raw in args.filters.iter() {
    let (field, value) = split_assignment(raw, "--filter")?;
    request.filters.push(Filter::KeywordEq {
      field: field.to_string(),
      value: value.to_string(),
    });
  }
  Ok(request)
}

fn split_assignment<'a>(raw: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
  match raw.split_once('=') {
    Some((field, value)) if !field.trim().is_empty() => Ok((field.trim(), value.trim())),
    _ => bail!("invalid {flag} `{raw}` (expected FIELD=VALUE)"),
  }
}

fn read_request(path: Option<PathBuf>, request_stdin: bool) -> Result<Option<PivotRequest>> {
  if let Some(p) = path {
    let contents =
      fs::read_to_string(&p).with_context(|| format!("reading pivot request from {:?}", p))?;
    let request = serde_json::from_str::<PivotRequest>(&contents)
      .with_context(|| format!("parsing pivot request JSON from {:?}", p))?;
    return Ok(Some(request));
  }
  if request_stdin {
    let mut buf = String::new();
    io::stdin()
      .read_to_string(&mut buf)
      .context("reading pivot request from stdin")?;
    let request = serde_json::from_str::<PivotRequest>(&buf)
      .context("parsing pivot request JSON from stdin")?;
    return Ok(Some(request));
  }
  Ok(None)
}

fn load_config(path: Option<&Path>) -> Result<PivotConfig> {
  let Some(p) = path else {
    return Ok(PivotConfig::default());
  };
  let contents =
    fs::read_to_string(p).with_context(|| format!("reading pivot config from {:?}", p))?;
  serde_json::from_str(&contents).with_context(|| format!("parsing pivot config JSON from {:?}", p))
}
