//! Validators backed by third-party schema languages.

use std::sync::Arc;

use serde_json::Value;

use crate::error::LoadError;
use crate::validators::Validator;

/// Build a property validator from a JSON Schema.
///
/// The property value is checked against `schema`; an absent value passes.
/// On failure the first violation's message becomes the error payload.
///
/// # Errors
///
/// Returns `LoadError::InvalidSchema` if `schema` is not a valid JSON Schema.
pub fn json_schema(schema: &Value) -> Result<Validator, LoadError> {
    let compiled = jsonschema::validator_for(schema).map_err(|e| LoadError::InvalidSchema {
        message: e.to_string(),
    })?;
    let compiled = Arc::new(compiled);

    Ok(Validator::new("jsonSchema", move |value, _, _| {
        let Some(value) = value else {
            return Ok(());
        };

        let instance = value.to_json_value();
        let first = compiled.iter_errors(&instance).next().map(|e| e.to_string());
        match first {
            None => Ok(()),
            Some(message) => Err(Value::String(message)),
        }
    }))
}
