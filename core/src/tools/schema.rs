use crate::error::FieldViolation;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamField {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(
        mut self,
        name: &str,
        description: &str,
        len: impl std::ops::RangeBounds<usize>,
        required: bool,
    ) -> Self {
        use std::ops::Bound;
        let min_len = match len.start_bound() {
            Bound::Included(&n) => Some(n),
            Bound::Excluded(&n) => Some(n + 1),
            Bound::Unbounded => None,
        };
        let max_len = match len.end_bound() {
            Bound::Included(&n) => Some(n),
            Bound::Excluded(&n) => Some(n.saturating_sub(1)),
            Bound::Unbounded => None,
        };
        self.fields.push(ParamField {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::String { min_len, max_len },
            required,
        });
        self
    }

    pub fn integer(
        mut self,
        name: &str,
        description: &str,
        min: Option<i64>,
        max: Option<i64>,
        required: bool,
    ) -> Self {
        self.fields.push(ParamField {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Integer { min, max },
            required,
        });
        self
    }

    pub fn boolean(mut self, name: &str, description: &str, required: bool) -> Self {
        self.fields.push(ParamField {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Boolean,
            required,
        });
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("description".into(), json!(field.description));
            match &field.kind {
                ParamKind::String { min_len, max_len } => {
                    prop.insert("type".into(), json!("string"));
                    if let Some(n) = min_len {
                        prop.insert("minLength".into(), json!(n));
                    }
                    if let Some(n) = max_len {
                        prop.insert("maxLength".into(), json!(n));
                    }
                }
                ParamKind::Integer { min, max } => {
                    prop.insert("type".into(), json!("integer"));
                    if let Some(n) = min {
                        prop.insert("minimum".into(), json!(n));
                    }
                    if let Some(n) = max {
                        prop.insert("maximum".into(), json!(n));
                    }
                }
                ParamKind::Boolean => {
                    prop.insert("type".into(), json!("boolean"));
                }
            }
            properties.insert(field.name.clone(), Value::Object(prop));
            if field.required {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Returns every violation, not just the first one. Unknown keys are ignored
    /// and an explicit `null` counts as absent.
    pub fn validate(&self, args: &Value) -> Result<(), Vec<FieldViolation>> {
        let Some(object) = args.as_object() else {
            return Err(vec![FieldViolation::new(
                "arguments",
                "expected a JSON object",
            )]);
        };

        let mut violations = Vec::new();

        for field in &self.fields {
            let value = match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(FieldViolation::new(&field.name, "is required"));
                    }
                    continue;
                }
                Some(v) => v,
            };

            if let Some(reason) = check_kind(&field.kind, value) {
                violations.push(FieldViolation::new(&field.name, reason));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_kind(kind: &ParamKind, value: &Value) -> Option<String> {
    match kind {
        ParamKind::String { min_len, max_len } => {
            let Some(s) = value.as_str() else {
                return Some(format!("expected string, got {}", type_name(value)));
            };
            let len = s.chars().count();
            if let Some(min) = min_len
                && len < *min
            {
                return Some(format!("must be at least {min} characters"));
            }
            if let Some(max) = max_len
                && len > *max
            {
                return Some(format!("must be at most {max} characters"));
            }
            None
        }
        ParamKind::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                return Some(format!("expected integer, got {}", type_name(value)));
            };
            if let Some(lo) = min
                && n < *lo
            {
                return Some(format!("must be >= {lo}"));
            }
            if let Some(hi) = max
                && n > *hi
            {
                return Some(format!("must be <= {hi}"));
            }
            None
        }
        ParamKind::Boolean => {
            if value.is_boolean() {
                None
            } else {
                Some(format!("expected boolean, got {}", type_name(value)))
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news_schema() -> ParamSchema {
        ParamSchema::new()
            .string("country", "ISO 3166-1 country code", 2..=2, true)
            .string("language", "ISO 639-1 language code", 2..=2, true)
            .string("query", "Keyword filter", .., false)
    }

    #[test]
    fn accepts_valid_arguments() {
        let schema = news_schema();
        assert!(schema
            .validate(&json!({"country": "jp", "language": "ja"}))
            .is_ok());
        assert!(schema
            .validate(&json!({"country": "us", "language": "en", "query": "rust", "extra": 1}))
            .is_ok());
    }

    #[test]
    fn reports_all_offending_fields() {
        let schema = news_schema();
        let violations = schema
            .validate(&json!({"country": "jpn", "query": 5}))
            .unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["country", "language", "query"]);
    }

    #[test]
    fn length_is_counted_in_characters() {
        let schema = ParamSchema::new().string("query", "q", 1..=3, true);
        assert!(schema.validate(&json!({"query": "日本語"})).is_ok());
        assert!(schema.validate(&json!({"query": ""})).is_err());
    }

    #[test]
    fn integer_and_boolean_bounds() {
        let schema = ParamSchema::new()
            .integer("limit", "max items", Some(1), Some(20), true)
            .boolean("fresh", "skip cache", false);
        assert!(schema.validate(&json!({"limit": 5, "fresh": true})).is_ok());
        assert!(schema.validate(&json!({"limit": 0})).is_err());
        assert!(schema.validate(&json!({"limit": 2.5})).is_err());
        assert!(schema.validate(&json!({"limit": 3, "fresh": "yes"})).is_err());
    }

    #[test]
    fn rejects_non_object_arguments() {
        let violations = news_schema().validate(&json!(["jp"])).unwrap_err();
        assert_eq!(violations[0].field, "arguments");
    }

    #[test]
    fn json_schema_carries_bounds_and_required() {
        let schema = news_schema().to_json_schema();
        assert_eq!(schema["properties"]["country"]["minLength"], 2);
        assert_eq!(schema["properties"]["country"]["maxLength"], 2);
        assert_eq!(schema["required"], json!(["country", "language"]));
        assert!(schema["properties"]["query"].get("maxLength").is_none());
    }
}
