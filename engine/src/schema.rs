//! Validators: the shape checks attached to each schema version.
//!
//! A [`Validator`] decides whether an arbitrary JSON value has the shape a
//! schema version expects. The engine only depends on the trait; callers can
//! bring their own validators or use the field-based [`ObjectSchema`].

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Accepts or rejects arbitrary values and reports why.
pub trait Validator: Send + Sync {
    /// Check `value`, returning the parsed value (with defaults applied) or
    /// the first problem found.
    fn safe_parse(&self, value: &Value) -> Result<Value>;

    /// Strict entry point for values produced by application code.
    fn parse(&self, value: &Value) -> Result<Value> {
        self.safe_parse(value)
    }

    /// Whether `value` passes validation.
    fn accepts(&self, value: &Value) -> bool {
        self.safe_parse(value).is_ok()
    }

    /// The value this schema produces when nothing is stored, if it has one.
    fn default_value(&self) -> Option<Value> {
        None
    }
}

/// Field types supported in object schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Array,
    Object,
    /// Arbitrary nested JSON
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Array => write!(f, "Array"),
            FieldType::Object => write!(f, "Object"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
    /// Value filled in when the field is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
        }
    }

    /// Fill this field with `value` when it is missing.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Schema for a JSON object described field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    /// Field definitions
    pub fields: Vec<FieldDef>,
    /// Reject fields that are not declared
    #[serde(default)]
    pub strict: bool,
}

impl ObjectSchema {
    /// Create a new object schema.
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            strict: false,
        }
    }

    /// Builder-style method to add a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject undeclared fields.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Get a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Validator for ObjectSchema {
    fn safe_parse(&self, value: &Value) -> Result<Value> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("value must be an object".into()))?;

        let mut parsed = obj.clone();
        for field in &self.fields {
            match (obj.get(&field.name), &field.default) {
                (None, Some(default)) => {
                    parsed.insert(field.name.clone(), default.clone());
                }
                (value, _) => field.validate(value)?,
            }
        }

        if self.strict {
            if let Some(unknown) = obj.keys().find(|k| self.field(k).is_none()) {
                return Err(Error::UnknownField(unknown.clone()));
            }
        }

        Ok(Value::Object(parsed))
    }

    /// Every field with a default, provided no required field lacks one.
    fn default_value(&self) -> Option<Value> {
        let mut defaults = Map::new();
        for field in &self.fields {
            match &field.default {
                Some(default) => {
                    defaults.insert(field.name.clone(), default.clone());
                }
                None if field.required => return None,
                None => {}
            }
        }
        Some(Value::Object(defaults))
    }
}

/// A validator backed by a closure.
pub struct FnValidator<F> {
    check: F,
    default: Option<Value>,
}

impl<F> FnValidator<F>
where
    F: Fn(&Value) -> Result<Value> + Send + Sync,
{
    pub fn new(check: F) -> Self {
        Self {
            check,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<Value> + Send + Sync,
{
    fn safe_parse(&self, value: &Value) -> Result<Value> {
        (self.check)(value)
    }

    fn default_value(&self) -> Option<Value> {
        self.default.clone()
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A small preferences document.
    fn prefs() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldDef::required("theme", FieldType::String),
            FieldDef::required("font_size", FieldType::Int),
            FieldDef::optional("accent", FieldType::String),
        ])
    }

    #[test]
    fn accepts_matching_document() {
        let doc = json!({"theme": "dark", "font_size": 14});
        assert_eq!(prefs().safe_parse(&doc).unwrap(), doc);
        assert!(prefs().accepts(&json!({"theme": "light", "font_size": 12, "accent": "teal"})));
    }

    #[test]
    fn required_field_must_be_present() {
        let missing = prefs().safe_parse(&json!({"theme": "dark"}));
        assert!(matches!(missing, Err(Error::MissingRequiredField(f)) if f == "font_size"));

        let null = prefs().safe_parse(&json!({"theme": null, "font_size": 14}));
        assert!(matches!(null, Err(Error::MissingRequiredField(f)) if f == "theme"));

        // Optional fields may be null
        assert!(prefs().accepts(&json!({"theme": "dark", "font_size": 14, "accent": null})));
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let result = prefs().safe_parse(&json!({"theme": "dark", "font_size": "large"}));
        assert_eq!(
            result,
            Err(Error::TypeMismatch {
                field: "font_size".into(),
                expected: "Int".into(),
                got: "String".into(),
            })
        );
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            prefs().safe_parse(&json!("dark")),
            Err(Error::InvalidPayload(_))
        ));
        assert!(!prefs().accepts(&json!([1, 2, 3])));
    }

    #[test]
    fn missing_field_takes_default() {
        let schema = ObjectSchema::new(vec![
            FieldDef::required("foo", FieldType::String).with_default("bar"),
        ]);

        assert_eq!(schema.safe_parse(&json!({})).unwrap(), json!({"foo": "bar"}));
        // A present value is never replaced
        assert_eq!(
            schema.safe_parse(&json!({"foo": "baz"})).unwrap(),
            json!({"foo": "baz"})
        );
        // A present value of the wrong type is still rejected
        assert!(schema.safe_parse(&json!({"foo": 1})).is_err());
    }

    #[test]
    fn strict_rejects_unknown_fields() {
        let doc = json!({"theme": "dark", "font_size": 14, "layout": "grid"});
        let result = prefs().strict().safe_parse(&doc);
        assert!(matches!(result, Err(Error::UnknownField(f)) if f == "layout"));

        // Lenient schemas keep unknown fields untouched
        assert_eq!(prefs().safe_parse(&doc).unwrap()["layout"], "grid");
    }

    #[test]
    fn default_value_collects_field_defaults() {
        let schema = ObjectSchema::new(vec![
            FieldDef::required("foo", FieldType::Float).with_default(0),
            FieldDef::optional("tags", FieldType::Array),
        ]);
        assert_eq!(schema.default_value(), Some(json!({"foo": 0})));

        // A required field without a default leaves the schema without one
        assert_eq!(prefs().default_value(), None);
    }

    #[test]
    fn float_accepts_integers() {
        let schema = ObjectSchema::new(vec![FieldDef::required("foo", FieldType::Float)]);
        assert!(schema.accepts(&json!({"foo": 0})));
        assert!(schema.accepts(&json!({"foo": 1.5})));

        let ints = ObjectSchema::new(vec![FieldDef::required("foo", FieldType::Int)]);
        assert!(!ints.accepts(&json!({"foo": 1.5})));
    }

    #[test]
    fn fn_validator() {
        let positive = FnValidator::new(|value: &Value| match value.as_i64() {
            Some(n) if n > 0 => Ok(value.clone()),
            _ => Err(Error::InvalidPayload("expected a positive integer".into())),
        })
        .with_default(1);

        assert!(positive.accepts(&json!(5)));
        assert!(!positive.accepts(&json!(-5)));
        assert_eq!(positive.default_value(), Some(json!(1)));
        assert_eq!(positive.parse(&json!(3)).unwrap(), json!(3));
    }

    #[test]
    fn schema_serialization() {
        let schema = ObjectSchema::new(vec![
            FieldDef::required("foo", FieldType::String).with_default("bar"),
        ])
        .strict();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("fieldType")); // camelCase
        let parsed: ObjectSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }
}
