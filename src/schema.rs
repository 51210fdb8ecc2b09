use jsonschema::validator_for;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("Schema parse error: {0}")]
    SchemaParse(#[from] serde_json::Error),
    #[error("Schema compile error: {0}")]
    SchemaCompile(String),
    #[error("Instance validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}

/// Validate a JSON instance against a JSON Schema (draft 2020-12).
pub fn validate_value(schema: &Value, instance: &Value) -> Result<(), SchemaValidationError> {
    let validator =
        validator_for(schema).map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))?;

    if validator.is_valid(instance) {
        return Ok(());
    }

    let reasons = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();
    Err(SchemaValidationError::ValidationFailed(reasons))
}

/// String-input variant of [`validate_value`].
pub fn validate_json(schema_str: &str, instance_str: &str) -> Result<(), SchemaValidationError> {
    let schema_json: Value = serde_json::from_str(schema_str)?;
    let instance_json: Value = serde_json::from_str(instance_str)?;
    validate_value(&schema_json, &instance_json)
}

/// First field named in the schema's `required` array that `arguments`
/// lacks. A `null` or empty-string value counts as missing.
///
/// Only `required` is consulted; every other argument passes through.
pub fn missing_required<'s>(schema: &'s Value, arguments: &Map<String, Value>) -> Option<&'s str> {
    let required = schema.get("required")?.as_array()?;
    required
        .iter()
        .filter_map(Value::as_str)
        .find(|field| match arguments.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn missing_required_reports_first_absent_field() {
        let schema = json!({"type": "object", "required": ["location", "days"]});
        assert_eq!(missing_required(&schema, &args(json!({}))), Some("location"));
        assert_eq!(
            missing_required(&schema, &args(json!({"location": "Oslo"}))),
            Some("days")
        );
        assert_eq!(
            missing_required(&schema, &args(json!({"location": "Oslo", "days": 3}))),
            None
        );
    }

    #[test]
    fn blank_and_null_values_count_as_missing() {
        let schema = json!({"required": ["location"]});
        assert_eq!(
            missing_required(&schema, &args(json!({"location": ""}))),
            Some("location")
        );
        assert_eq!(
            missing_required(&schema, &args(json!({"location": null}))),
            Some("location")
        );
    }

    #[test]
    fn schema_without_required_accepts_anything() {
        let schema = json!({"type": "object", "properties": {}});
        assert_eq!(missing_required(&schema, &args(json!({"extra": 1}))), None);
    }

    #[test]
    fn validation_failure_lists_reasons() {
        let schema = json!({"type": "object", "required": ["a"]});
        match validate_value(&schema, &json!({})) {
            Err(SchemaValidationError::ValidationFailed(reasons)) => assert!(!reasons.is_empty()),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
