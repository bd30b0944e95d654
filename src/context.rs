//! Per-run variable context
//!
//! A single mutable mapping owned exclusively by one run. Built from the
//! user-supplied initial values and extended, one step at a time, with each
//! step's extracted outputs. Never shared across concurrent runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variable name → value mapping for one workflow run.
///
/// Values are either plain strings or structured JSON. BTreeMap keeps
/// serialization order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context from user-supplied initial values
    pub fn from_inputs(inputs: BTreeMap<String, Value>) -> Self {
        Self { values: inputs }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Insert a value. Colliding names are overwritten (last write wins).
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Merge a step's extracted outputs, overwriting colliding names
    pub fn merge(&mut self, outputs: &BTreeMap<String, Value>) {
        for (name, value) in outputs {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stringify a value for prompt substitution: strings substitute verbatim,
    /// structured values as canonical JSON text.
    pub fn stringify(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_write_wins_on_collision() {
        let mut ctx = Context::new();
        ctx.insert("summary", json!("first"));
        ctx.insert("summary", json!("second"));
        assert_eq!(ctx.get("summary"), Some(&json!("second")));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn merge_overwrites_and_extends() {
        let mut ctx = Context::from_inputs(BTreeMap::from([
            ("topic".to_string(), json!("owls")),
            ("tone".to_string(), json!("dry")),
        ]));

        let mut outputs = BTreeMap::new();
        outputs.insert("tone".to_string(), json!("warm"));
        outputs.insert("draft".to_string(), json!("Owls are great."));
        ctx.merge(&outputs);

        assert_eq!(ctx.get("topic"), Some(&json!("owls")));
        assert_eq!(ctx.get("tone"), Some(&json!("warm")));
        assert_eq!(ctx.get("draft"), Some(&json!("Owls are great.")));
    }

    #[test]
    fn stringify_strings_verbatim() {
        assert_eq!(Context::stringify(&json!("hello")), "hello");
    }

    #[test]
    fn stringify_structured_as_canonical_json() {
        assert_eq!(
            Context::stringify(&json!({"a": 1, "b": [true, null]})),
            r#"{"a":1,"b":[true,null]}"#
        );
        assert_eq!(Context::stringify(&json!(42)), "42");
    }

    #[test]
    fn serializes_round_trip() {
        let mut ctx = Context::new();
        ctx.insert("nested", json!({"deep": {"value": 7}}));
        ctx.insert("plain", json!("text"));

        let serialized = serde_json::to_string(&ctx).unwrap();
        let restored: Context = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored.get("nested"), ctx.get("nested"));
        assert_eq!(restored.get("plain"), ctx.get("plain"));
    }
}
