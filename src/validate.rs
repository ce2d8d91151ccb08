//! Validation of entity records against a resolved schema.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use crate::error::ValidationError;
use crate::schema::Schema;
use crate::types::Record;

/// Run every property validator and collect the failures.
///
/// Skippable properties whose value is absent are not validated at all.
/// Every other property is checked even after an earlier one failed.
pub fn collect_errors(schema: &Schema, data: &Record) -> BTreeMap<String, Value> {
    let mut errors = BTreeMap::new();

    for (name, prop) in schema {
        let value = data.get(name);
        if prop.skippable && value.is_none() {
            trace!(property = %name, "skipped absent property");
            continue;
        }

        if let Err(error) = prop.validator.check(value, name, data) {
            trace!(property = %name, validator = prop.validator.name(), "property failed validation");
            errors.insert(name.clone(), error);
        }
    }

    errors
}

/// Validate a record against a schema.
///
/// Returns the same record on success so calls can be chained.
///
/// # Errors
///
/// Returns a `ValidationError` whose `details` holds one entry per failing
/// property.
pub fn validate<'a>(schema: &Schema, data: &'a Record) -> Result<&'a Record, ValidationError> {
    let errors = collect_errors(schema, data);

    if errors.is_empty() {
        Ok(data)
    } else {
        Err(ValidationError::new(errors))
    }
}
