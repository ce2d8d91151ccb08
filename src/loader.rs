//! Loading schema definitions from JSON.
//!
//! A definition file is an object of property definitions plus an optional
//! `$contexts` object:
//!
//! ```json
//! {
//!   "id": { "readOnly": true, "validator": { "jsonSchema": { "type": "string" } } },
//!   "age": { "factory": "number", "skippable": true },
//!   "address": { "factory": { "entity": { "street": {} } }, "validator": "delegate" },
//!   "$contexts": { "create": { "$exclude": ["id"], "$skip": ["age"] } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::adapters::json_schema;
use crate::collection::CollectionFactory;
use crate::error::LoadError;
use crate::factory::EntityFactory;
use crate::nested::{Coercion, PropertyFactory};
use crate::types::{
    json_type_name, ContextDefinition, PropertyDefinition, SchemaDefinition, CONTEXTS_KEY,
    METHODS_KEY,
};
use crate::validators::{allow_any, delegate, forbid_any, Validator};

/// Keys accepted inside a property definition.
pub const PROPERTY_KEYS: &[&str] = &["validator", "factory", "default", "readOnly", "skippable"];

/// Operator keys accepted inside a context definition.
pub const CONTEXT_OPERATORS: &[&str] = &["$include", "$exclude", "$modify", "$skip"];

/// Load any JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema definition from a file path.
///
/// # Errors
///
/// Returns the IO and parse errors of [`load_json`], or
/// `LoadError::InvalidDefinition` if the document is not a valid definition.
pub fn load_definition(path: &Path) -> Result<SchemaDefinition, LoadError> {
    parse_definition(&load_json(path)?)
}

/// Load a schema definition from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidDefinition`.
pub fn load_definition_str(content: &str) -> Result<SchemaDefinition, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    parse_definition(&value)
}

/// Parse a schema definition from a JSON value.
///
/// # Errors
///
/// Returns `LoadError::InvalidDefinition` with the JSON pointer of the first
/// offending value, or `LoadError::InvalidSchema` for a broken embedded JSON
/// Schema.
pub fn parse_definition(value: &Value) -> Result<SchemaDefinition, LoadError> {
    parse_definition_at(value, "")
}

fn parse_definition_at(value: &Value, path: &str) -> Result<SchemaDefinition, LoadError> {
    let map = expect_object(value, path)?;
    let mut definition = SchemaDefinition::new();

    for (key, value) in map {
        let child_path = pointer(path, key);
        match key.as_str() {
            CONTEXTS_KEY => {
                for (name, context) in expect_object(value, &child_path)? {
                    let context_path = pointer(&child_path, name);
                    definition
                        .contexts
                        .insert(name.clone(), parse_context(context, &context_path)?);
                }
            }
            METHODS_KEY => {
                warn!(path = %child_path, "$methods cannot be loaded from JSON and is ignored");
            }
            _ => {
                definition
                    .properties
                    .insert(key.clone(), parse_property(value, &child_path)?);
            }
        }
    }

    Ok(definition)
}

fn parse_property(value: &Value, path: &str) -> Result<PropertyDefinition, LoadError> {
    let map = expect_object(value, path)?;
    let mut property = PropertyDefinition::new();

    for (key, value) in map {
        let child_path = pointer(path, key);
        match key.as_str() {
            "validator" => property.validator = Some(validator_at(value, &child_path)?),
            "factory" => property.factory = Some(parse_factory(value, &child_path)?),
            "default" => property.default = Some(value.clone()),
            "readOnly" => property.read_only = expect_bool(value, &child_path)?,
            "skippable" => property.skippable = expect_bool(value, &child_path)?,
            other => {
                return Err(invalid(
                    &child_path,
                    format!(
                        "unknown property setting \"{}\": expected {}",
                        other,
                        PROPERTY_KEYS.join(", ")
                    ),
                ))
            }
        }
    }

    Ok(property)
}

/// Parse a validator spec: a built-in name or a single-key object.
///
/// # Errors
///
/// Returns `LoadError::InvalidDefinition` for an unknown or malformed spec,
/// or `LoadError::InvalidSchema` for a broken embedded JSON Schema.
pub fn parse_validator(value: &Value) -> Result<Validator, LoadError> {
    validator_at(value, "")
}

fn validator_at(value: &Value, path: &str) -> Result<Validator, LoadError> {
    match value {
        Value::String(name) => match name.as_str() {
            "allowAny" => Ok(allow_any()),
            "forbidAny" => Ok(forbid_any()),
            "delegate" => Ok(delegate(None, false)),
            other => Err(invalid(
                path,
                format!(
                    "unknown validator \"{}\": expected allowAny, forbidAny or delegate",
                    other
                ),
            )),
        },
        Value::Object(map) if map.len() == 1 => {
            let Some((kind, spec)) = map.iter().next() else {
                return Err(type_mismatch(path, "single-key object", value));
            };
            let spec_path = pointer(path, kind);
            match kind.as_str() {
                "jsonSchema" => json_schema(spec),
                "delegate" => {
                    let options = expect_object(spec, &spec_path)?;
                    let context = match options.get("context") {
                        None => None,
                        Some(Value::String(s)) => Some(s.as_str()),
                        Some(other) => {
                            return Err(type_mismatch(&pointer(&spec_path, "context"), "string", other))
                        }
                    };
                    let required = match options.get("required") {
                        None => false,
                        Some(v) => expect_bool(v, &pointer(&spec_path, "required"))?,
                    };
                    Ok(delegate(context, required))
                }
                other => Err(invalid(
                    path,
                    format!("unknown validator \"{}\": expected jsonSchema or delegate", other),
                )),
            }
        }
        other => Err(type_mismatch(path, "string or single-key object", other)),
    }
}

fn parse_factory(value: &Value, path: &str) -> Result<PropertyFactory, LoadError> {
    match value {
        Value::String(name) => Coercion::parse(name).map(PropertyFactory::Coerce).ok_or_else(|| {
            invalid(
                path,
                format!(
                    "unknown factory \"{}\": expected number, string or boolean",
                    name
                ),
            )
        }),
        Value::Object(map) if map.len() == 1 => {
            let Some((kind, spec)) = map.iter().next() else {
                return Err(type_mismatch(path, "single-key object", value));
            };
            let spec_path = pointer(path, kind);
            match kind.as_str() {
                "entity" => {
                    let nested = parse_definition_at(spec, &spec_path)?;
                    Ok(PropertyFactory::Entity(EntityFactory::new(nested)))
                }
                "collection" => {
                    let nested = parse_definition_at(spec, &spec_path)?;
                    Ok(PropertyFactory::Collection(CollectionFactory::new(
                        EntityFactory::new(nested),
                    )))
                }
                other => Err(invalid(
                    path,
                    format!("unknown factory \"{}\": expected entity or collection", other),
                )),
            }
        }
        other => Err(type_mismatch(path, "string or single-key object", other)),
    }
}

fn parse_context(value: &Value, path: &str) -> Result<ContextDefinition, LoadError> {
    let map = expect_object(value, path)?;
    let mut context = ContextDefinition::new();

    for (key, value) in map {
        let child_path = pointer(path, key);
        match key.as_str() {
            "$include" => context.include = parse_names(value, &child_path)?,
            "$exclude" => context.exclude = parse_names(value, &child_path)?,
            "$skip" => context.skip = parse_names(value, &child_path)?,
            "$modify" => {
                let mut modify = BTreeMap::new();
                for (name, spec) in expect_object(value, &child_path)? {
                    let spec_path = pointer(&child_path, name);
                    modify.insert(name.clone(), validator_at(spec, &spec_path)?);
                }
                context.modify = modify;
            }
            other => {
                return Err(invalid(
                    &child_path,
                    format!(
                        "unknown context operator \"{}\": expected {}",
                        other,
                        CONTEXT_OPERATORS.join(", ")
                    ),
                ))
            }
        }
    }

    Ok(context)
}

fn parse_names(value: &Value, path: &str) -> Result<Vec<String>, LoadError> {
    let Value::Array(items) = value else {
        return Err(type_mismatch(path, "array", value));
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(type_mismatch(&pointer(path, &i.to_string()), "string", other)),
        })
        .collect()
}

/// Append one JSON-pointer segment, escaping `~` and `/`.
pub(crate) fn pointer(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment.replace('~', "~0").replace('/', "~1"))
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, LoadError> {
    value
        .as_object()
        .ok_or_else(|| type_mismatch(path, "object", value))
}

fn expect_bool(value: &Value, path: &str) -> Result<bool, LoadError> {
    value
        .as_bool()
        .ok_or_else(|| type_mismatch(path, "boolean", value))
}

fn type_mismatch(path: &str, expected: &str, actual: &Value) -> LoadError {
    invalid(
        path,
        format!("expected {}, got {}", expected, json_type_name(actual)),
    )
}

fn invalid(path: &str, message: String) -> LoadError {
    LoadError::InvalidDefinition {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        message,
    }
}
