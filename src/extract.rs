//! Two-tier output extraction
//!
//! Classifies a model response against a step's expected output keys and
//! returns a tagged result, so the engine's branching on extraction outcome
//! is exhaustive and testable without a live model call:
//!
//! - [`Extraction::Structured`]: the client returned a parsed object carrying
//!   every expected key; extra keys are dropped.
//! - [`Extraction::Heuristic`]: the client returned a string that either
//!   parses as a JSON object containing some expected keys, or yields
//!   `key: value` line matches. Keys not found are simply absent.
//! - [`Extraction::Unparsed`]: nothing matched; the raw text is kept.
//!
//! A structured *object* missing a required key is an error, not a fallback.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::schema::SchemaDescriptor;

/// Outcome of classifying a model response
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Parsed object with every expected key present
    Structured(BTreeMap<String, Value>),
    /// Best-effort extraction from free text; may cover only some keys
    Heuristic(BTreeMap<String, Value>),
    /// No expected key could be recovered
    Unparsed(String),
}

impl Extraction {
    /// Heuristic and unparsed outcomes succeed with a warning
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Extraction::Structured(_))
    }
}

/// Classify a model response against the expected output schema.
///
/// `Err` carries the missing required keys when a structured object omits
/// some of them (the step must fail in that case).
pub fn classify(response: &Value, schema: &SchemaDescriptor) -> Result<Extraction, Vec<String>> {
    match response {
        Value::Object(map) => {
            schema.validate(response)?;
            Ok(Extraction::Structured(take_expected(map, schema)))
        }
        Value::String(text) => Ok(classify_text(text, schema)),
        // Clients return objects or strings; anything else is treated as the
        // raw canonical text of the value.
        other => Ok(Extraction::Unparsed(other.to_string())),
    }
}

fn classify_text(text: &str, schema: &SchemaDescriptor) -> Extraction {
    // Tier 1: the string itself is a JSON object; take whichever expected
    // keys it carries
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        let found = take_expected(&map, schema);
        if !found.is_empty() {
            return Extraction::Heuristic(found);
        }
    }

    // Tier 2: per-key `key: value` pattern against the raw text
    let mut found = BTreeMap::new();
    for key in schema.required_keys() {
        if let Some(value) = match_key_value(text, key) {
            found.insert(key.clone(), Value::String(value));
        }
    }
    if !found.is_empty() {
        return Extraction::Heuristic(found);
    }

    Extraction::Unparsed(text.to_string())
}

fn take_expected(map: &Map<String, Value>, schema: &SchemaDescriptor) -> BTreeMap<String, Value> {
    schema
        .required_keys()
        .iter()
        .filter_map(|key| map.get(key).map(|v| (key.clone(), v.clone())))
        .collect()
}

/// Find `key: value` (or `key = value`) in free text, capturing to end of line
fn match_key_value(text: &str, key: &str) -> Option<String> {
    let pattern = format!(r"(?m)\b{}\b\s*[:=]\s*(.+?)\s*$", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    let captured = re.captures(text)?.get(1)?.as_str();
    Some(strip_quotes(captured).to_string())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim().trim_end_matches(',');
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
