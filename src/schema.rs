//! Output schema builder
//!
//! Converts a step's output declarations into a structured-generation
//! contract: an object schema whose properties are exactly the declared
//! output names, all required. Values are intentionally untyped (a model may
//! return a string or a structured value for any output); each property
//! carries the declared description as guidance for the model.

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};

use crate::workflow::OutputSpec;

/// Structured-generation contract passed to a model client when a step
/// declares at least one output
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    schema: Value,
    required: Vec<String>,
}

impl SchemaDescriptor {
    pub fn for_outputs(outputs: &[OutputSpec]) -> Self {
        let mut properties = Map::new();
        for output in outputs {
            let mut property = Map::new();
            if !output.description.is_empty() {
                property.insert("description".to_string(), json!(output.description));
            }
            properties.insert(output.name.clone(), Value::Object(property));
        }

        let required: Vec<String> = outputs.iter().map(|o| o.name.clone()).collect();
        let schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });

        Self { schema, required }
    }

    /// The JSON Schema document handed to the model client
    pub fn as_json(&self) -> &Value {
        &self.schema
    }

    /// Expected output keys, in declaration order
    pub fn required_keys(&self) -> &[String] {
        &self.required
    }

    /// Validate a structured response against the schema.
    ///
    /// Returns the missing required keys on failure. Compilation is fast;
    /// validation needs a fresh instance (same trade-off the schema cache in
    /// the output pipeline makes).
    pub fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        let compiled = match JSONSchema::compile(&self.schema) {
            Ok(c) => c,
            // The schema is built above and always compiles; surface the
            // message rather than panic if that ever changes.
            Err(e) => return Err(vec![e.to_string()]),
        };

        let mut violations = Vec::new();
        if let Err(errors) = compiled.validate(value) {
            for error in errors {
                match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        violations.push(property.as_str().unwrap_or_default().to_string());
                    }
                    _ => violations.push(error.to_string()),
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(names: &[(&str, &str)]) -> Vec<OutputSpec> {
        names
            .iter()
            .map(|(name, description)| OutputSpec {
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect()
    }

    #[test]
    fn schema_has_exactly_the_declared_properties() {
        let descriptor =
            SchemaDescriptor::for_outputs(&outputs(&[("title", "The title"), ("body", "")]));
        let schema = descriptor.as_json();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["description"], "The title");
        assert!(schema["properties"]["body"].is_object());
        assert_eq!(schema["required"], json!(["title", "body"]));
        assert_eq!(descriptor.required_keys(), ["title", "body"]);
    }

    #[test]
    fn validate_accepts_complete_object() {
        let descriptor = SchemaDescriptor::for_outputs(&outputs(&[("x", ""), ("y", "")]));
        let value = json!({"x": "hello", "y": {"nested": true}});
        assert!(descriptor.validate(&value).is_ok());
    }

    #[test]
    fn validate_reports_every_missing_key() {
        let descriptor = SchemaDescriptor::for_outputs(&outputs(&[("x", ""), ("y", "")]));
        let missing = descriptor.validate(&json!({})).unwrap_err();
        assert_eq!(missing, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn validate_allows_extra_keys() {
        let descriptor = SchemaDescriptor::for_outputs(&outputs(&[("x", "")]));
        assert!(descriptor.validate(&json!({"x": 1, "extra": 2})).is_ok());
    }

    #[test]
    fn validate_rejects_non_object() {
        let descriptor = SchemaDescriptor::for_outputs(&outputs(&[("x", "")]));
        assert!(descriptor.validate(&json!("just text")).is_err());
    }

    #[test]
    fn values_are_untyped() {
        let descriptor = SchemaDescriptor::for_outputs(&outputs(&[("x", "")]));
        for value in [json!({"x": "s"}), json!({"x": 3}), json!({"x": [1, 2]})] {
            assert!(descriptor.validate(&value).is_ok(), "rejected {value}");
        }
    }
}
