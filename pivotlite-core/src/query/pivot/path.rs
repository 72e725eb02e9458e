//! Refinement path codec.
//!
//! A path names one pivot node by the value taken at each level, root first.
//! Levels are joined with `,`. A real value is written as `~` followed by the
//! value with `\` and `,` escaped by a leading `\`; missing is the bare `^`.
//! Every real level starts with `~`, so no value can encode to the missing
//! token, and the empty string stays distinguishable from missing. The empty
//! path encodes as the empty string.
//!
//! Shards must agree on these constants.

use crate::api::errors::PivotError;
use crate::api::types::TermKey;

pub const LEVEL_SEPARATOR: char = ',';
pub const ESCAPE: char = '\\';
pub const TERM_PREFIX: char = '~';
pub const MISSING_TOKEN: char = '^';

pub fn encode_path(values: &[TermKey]) -> String {
  let mut out = String::new();
  for (idx, value) in values.iter().enumerate() {
    if idx > 0 {
      out.push(LEVEL_SEPARATOR);
    }
    match value {
      TermKey::Missing => out.push(MISSING_TOKEN),
      TermKey::Term(term) => {
        out.push(TERM_PREFIX);
        escape_into(term, &mut out);
      }
    }
  }
  out
}

fn escape_into(term: &str, out: &mut String) {
  out.reserve(term.len());
  for ch in term.chars() {
    if ch == LEVEL_SEPARATOR || ch == ESCAPE {
      out.push(ESCAPE);
    }
    out.push(ch);
  }
}

pub fn decode_path(token: &str) -> Result<Vec<TermKey>, PivotError> {
  if token.is_empty() {
    return Ok(Vec::new());
  }
  split_levels(token)
    .map_err(|reason| PivotError::malformed(token, reason))?
    .into_iter()
    .enumerate()
    .map(|(idx, level)| {
      decode_level(level)
        .map_err(|reason| PivotError::malformed(token, format!("level {idx}: {reason}")))
    })
    .collect()
}

/// Splits at unescaped separators, leaving escapes in place.
fn split_levels(token: &str) -> Result<Vec<&str>, &'static str> {
  let mut levels = Vec::new();
  let mut start = 0;
  let mut chars = token.char_indices();
  while let Some((idx, ch)) = chars.next() {
    if ch == ESCAPE {
      match chars.next() {
        Some((_, next)) if next == ESCAPE || next == LEVEL_SEPARATOR => {}
        Some(_) => return Err("unknown escape sequence"),
        None => return Err("dangling escape at end of path"),
      }
    } else if ch == LEVEL_SEPARATOR {
      levels.push(&token[start..idx]);
      start = idx + ch.len_utf8();
    }
  }
  levels.push(&token[start..]);
  Ok(levels)
}

fn decode_level(level: &str) -> Result<TermKey, &'static str> {
  let mut chars = level.chars();
  match chars.next() {
    None => Err("empty level"),
    Some(MISSING_TOKEN) if chars.as_str().is_empty() => Ok(TermKey::Missing),
    Some(MISSING_TOKEN) => Err("missing marker followed by a value"),
    Some(TERM_PREFIX) => Ok(TermKey::Term(unescape(chars.as_str()))),
    Some(_) => Err("level does not start with a value prefix"),
  }
}

// Escapes were validated by `split_levels`.
fn unescape(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut chars = raw.chars();
  while let Some(ch) = chars.next() {
    if ch == ESCAPE {
      if let Some(next) = chars.next() {
        out.push(next);
      }
    } else {
      out.push(ch);
    }
  }
  out
}
