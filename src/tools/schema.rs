//! Argument schemas for tools
//!
//! Each tool declares its arguments as a JSON Schema object. The schema is
//! compiled once at registration and used both for the model's tool
//! catalog and for validating the arguments a model (or a human editing a
//! suspended call) supplies.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Field name reported when the arguments as a whole are wrong
const ROOT_FIELD: &str = "$";

/// Bad tool arguments, attributable to a single field
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid argument `{field}`: {reason}")]
pub struct SchemaError {
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A tool's compiled argument schema
pub struct ArgSchema {
    raw: Value,
    compiled: JSONSchema,
    properties: Vec<String>,
}

impl ArgSchema {
    /// Compile a JSON Schema object. Fails if the schema itself is malformed.
    pub fn compile(raw: Value) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .compile(&raw)
            .map_err(|err| format!("invalid schema: {err}"))?;
        let properties = raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Self {
            raw,
            compiled,
            properties,
        })
    }

    /// The schema as declared, for the model's tool catalog
    pub fn json(&self) -> &Value {
        &self.raw
    }

    /// Validate arguments, returning a copy holding only declared
    /// properties. Null values count as absent.
    pub fn validate(&self, arguments: &Value) -> Result<Value, SchemaError> {
        let instance = match arguments {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        };

        if let Err(mut errors) = self.compiled.validate(&instance) {
            let first = errors.next().map_or_else(
                || SchemaError::new(ROOT_FIELD, "arguments do not match schema"),
                |err| match &err.kind {
                    ValidationErrorKind::Required { property } => SchemaError::new(
                        property.as_str().unwrap_or(ROOT_FIELD),
                        "missing required field",
                    ),
                    _ => SchemaError::new(field_of(&err.instance_path.to_string()), err.to_string()),
                },
            );
            return Err(first);
        }

        let Value::Object(input) = instance else {
            return Err(SchemaError::new(ROOT_FIELD, "expected object"));
        };
        let sanitized: Map<String, Value> = input
            .into_iter()
            .filter(|(k, _)| self.properties.contains(k))
            .collect();
        Ok(Value::Object(sanitized))
    }
}

/// Top-level property named by an instance pointer such as `/recipient`
fn field_of(pointer: &str) -> &str {
    pointer
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(ROOT_FIELD)
}

impl fmt::Debug for ArgSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSchema")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
