//! Argument schemas: typed, validating descriptions of tool argument
//! objects.
//!
//! Schemas are compiled once at registration. Strict mode is mandatory:
//! an object schema that does not reject unknown fields is refused, so a
//! plugin cannot smuggle in a lenient argument surface.

use serde_json::Value;

/// Why a schema was refused at registration time.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema root must be an object type")]
    NotAnObject,
    #[error("schema must set additionalProperties: false")]
    NotStrict,
    #[error("schema does not compile: {0}")]
    Invalid(String),
}

/// A compiled, strict argument schema.
pub struct ArgSchema {
    raw: Value,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for ArgSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgSchema").field("raw", &self.raw).finish()
    }
}

impl ArgSchema {
    /// Compile a schema, enforcing the strictness contract.
    pub fn new(raw: Value) -> Result<Self, SchemaError> {
        if raw.get("type").and_then(Value::as_str) != Some("object") {
            return Err(SchemaError::NotAnObject);
        }
        if raw.get("additionalProperties") != Some(&Value::Bool(false)) {
            return Err(SchemaError::NotStrict);
        }
        let validator =
            jsonschema::validator_for(&raw).map_err(|e| SchemaError::Invalid(e.to_string()))?;
        Ok(Self { raw, validator })
    }

    /// Validate an argument object. The error message is path-qualified.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        match self.validator.validate(args) {
            Ok(()) => Ok(()),
            Err(err) => {
                let location = err.instance_path().to_string();
                if location.is_empty() {
                    Err(err.to_string())
                } else {
                    Err(format!("{location}: {err}"))
                }
            }
        }
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
