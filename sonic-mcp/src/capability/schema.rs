//! Declarative input schemas for capabilities.
//!
//! A schema lists required and optional fields with a primitive type and an
//! optional custom validator. Validation runs before a handler is dispatched;
//! the same schema renders the JSON Schema advertised in listings.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::error::Error;

/// Expected JSON type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON integer, optionally bounded.
    Integer {
        /// Inclusive lower bound.
        min: Option<i64>,
        /// Inclusive upper bound.
        max: Option<i64>,
    },
    /// JSON string or non-negative integer, e.g. a network name or chain ID.
    StringOrInteger,
    /// JSON array whose items match the inner type.
    Array(Box<FieldType>),
    /// Any JSON value.
    Any,
}

impl FieldType {
    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer { min, max } => {
                let mut schema = Map::new();
                schema.insert("type".into(), "integer".into());
                if let Some(min) = min {
                    schema.insert("minimum".into(), (*min).into());
                }
                if let Some(max) = max {
                    schema.insert("maximum".into(), (*max).into());
                }
                Value::Object(schema)
            }
            Self::StringOrInteger => json!({ "type": ["string", "integer"] }),
            Self::Array(inner) => json!({ "type": "array", "items": inner.json_schema() }),
            Self::Any => json!({}),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer { .. } => f.write_str("integer"),
            Self::StringOrInteger => f.write_str("string or integer"),
            Self::Array(inner) => write!(f, "array of {inner}"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// One named input field.
pub struct Field {
    name: String,
    description: &'static str,
    field_type: FieldType,
    validator: Option<FieldValidator>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl Field {
    /// Creates a field.
    pub fn new(name: impl Into<String>, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name: name.into(),
            description,
            field_type,
            validator: None,
        }
    }

    /// String field.
    pub fn string(name: impl Into<String>, description: &'static str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    /// Adds a custom validator.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: &Value) -> Result<(), Error> {
        check_type(&self.name, value, &self.field_type)?;
        if let Some(validator) = &self.validator {
            validator(value)
                .map_err(|message| Error::invalid_input(format!("field '{}': {message}", self.name)))?;
        }
        Ok(())
    }
}

/// Required and optional fields of a capability input object.
#[derive(Debug, Default)]
pub struct InputSchema {
    required: Vec<Field>,
    optional: Vec<Field>,
}

impl InputSchema {
    /// Creates a schema.
    pub const fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
        Self { required, optional }
    }

    /// Schema accepting only an empty (or absent) object.
    pub const fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Names of required fields, in declaration order.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(Field::name)
    }

    /// Checks `input` against the schema. Unknown fields are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] naming the first offending field.
    pub fn validate(&self, input: &Value) -> Result<(), Error> {
        let object = input.as_object().ok_or_else(|| {
            Error::invalid_input(format!("expected an object, got {}", type_name(input)))
        })?;

        for field in &self.required {
            let value = object
                .get(&field.name)
                .filter(|v| !v.is_null())
                .ok_or_else(|| Error::invalid_input(format!("missing required field '{}'", field.name)))?;
            field.check(value)?;
        }
        for field in &self.optional {
            if let Some(value) = object.get(&field.name).filter(|v| !v.is_null()) {
                field.check(value)?;
            }
        }
        Ok(())
    }

    /// JSON Schema (`type: object`) describing the input.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .required
            .iter()
            .chain(&self.optional)
            .map(|field| {
                let mut schema = field.field_type.json_schema();
                if let Value::Object(object) = &mut schema {
                    object.insert("description".into(), field.description.into());
                }
                (field.name.clone(), schema)
            })
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names().collect::<Vec<_>>(),
        })
    }
}

fn check_type(name: &str, value: &Value, expected: &FieldType) -> Result<(), Error> {
    let mismatch = || {
        Error::invalid_input(format!(
            "field '{name}': expected {expected}, got {}",
            type_name(value)
        ))
    };
    match expected {
        FieldType::String => value.is_string().then_some(()).ok_or_else(mismatch),
        FieldType::Any => Ok(()),
        FieldType::StringOrInteger => (value.is_string() || value.is_u64())
            .then_some(())
            .ok_or_else(mismatch),
        FieldType::Integer { min, max } => {
            let int = value.as_i64().ok_or_else(mismatch)?;
            if let Some(min) = min
                && int < *min
            {
                return Err(Error::invalid_input(format!(
                    "field '{name}': {int} is less than minimum {min}"
                )));
            }
            if let Some(max) = max
                && int > *max
            {
                return Err(Error::invalid_input(format!(
                    "field '{name}': {int} is greater than maximum {max}"
                )));
            }
            Ok(())
        }
        FieldType::Array(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| check_type(&format!("{name}[{i}]"), item, inner))
        }
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
