//! Nested property factories: child entities, collections and primitive
//! coercions.

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::collection::CollectionFactory;
use crate::factory::EntityFactory;
use crate::types::{is_truthy, Field};

/// What a property runs incoming values through.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyFactory {
    Entity(EntityFactory),
    Collection(CollectionFactory),
    Coerce(Coercion),
}

impl PropertyFactory {
    /// Build the stored field from an incoming value.
    ///
    /// Incompatible input is never an error here: entity factories treat it
    /// as empty data, collection factories as an empty sequence, coercions
    /// degrade to `null`.
    pub fn apply(&self, input: Field) -> Field {
        match self {
            PropertyFactory::Entity(factory) => Field::Entity(factory.create(input)),
            PropertyFactory::Collection(factory) => Field::Collection(factory.create(input)),
            PropertyFactory::Coerce(coercion) => {
                let value = match input {
                    Field::Json(value) => value,
                    other => other.to_json_value(),
                };
                Field::Json(coercion.coerce(value))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PropertyFactory::Entity(_) => "entity".to_string(),
            PropertyFactory::Collection(_) => "collection".to_string(),
            PropertyFactory::Coerce(coercion) => coercion.name().to_string(),
        }
    }
}

impl From<EntityFactory> for PropertyFactory {
    fn from(factory: EntityFactory) -> Self {
        PropertyFactory::Entity(factory)
    }
}

impl From<CollectionFactory> for PropertyFactory {
    fn from(factory: CollectionFactory) -> Self {
        PropertyFactory::Collection(factory)
    }
}

impl From<Coercion> for PropertyFactory {
    fn from(coercion: Coercion) -> Self {
        PropertyFactory::Coerce(coercion)
    }
}

/// Run `value` through the property's factory, if any.
///
/// A `null` value with a factory configured yields `None` so that no empty
/// child entity is created for missing data.
pub(crate) fn wrap(factory: Option<&PropertyFactory>, value: Field) -> Option<Field> {
    match factory {
        None => Some(value),
        Some(_) if value.is_null() => None,
        Some(factory) => Some(factory.apply(value)),
    }
}

/// Primitive coercion applied to plain JSON values.
#[derive(Clone)]
pub enum Coercion {
    Number,
    String,
    Boolean,
    Custom {
        name: Arc<str>,
        f: Arc<dyn Fn(Value) -> Value + Send + Sync>,
    },
}

impl Coercion {
    pub fn custom<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Coercion::Custom {
            name: Arc::from(name.into()),
            f: Arc::new(f),
        }
    }

    /// Parse a coercion name as used in JSON definitions.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Coercion::Number),
            "string" => Some(Coercion::String),
            "boolean" => Some(Coercion::Boolean),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Coercion::Number => "number",
            Coercion::String => "string",
            Coercion::Boolean => "boolean",
            Coercion::Custom { name, .. } => name,
        }
    }

    pub fn coerce(&self, value: Value) -> Value {
        match self {
            Coercion::Number => to_number(value),
            Coercion::String => to_string(value),
            Coercion::Boolean => Value::Bool(is_truthy(&value)),
            Coercion::Custom { f, .. } => f(value),
        }
    }
}

impl PartialEq for Coercion {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Coercion::Number, Coercion::Number)
            | (Coercion::String, Coercion::String)
            | (Coercion::Boolean, Coercion::Boolean) => true,
            (Coercion::Custom { f: a, .. }, Coercion::Custom { f: b, .. }) => std::ptr::eq(
                Arc::as_ptr(a) as *const (),
                Arc::as_ptr(b) as *const (),
            ),
            _ => false,
        }
    }
}

impl fmt::Debug for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Coercion").field(&self.name()).finish()
    }
}

// Not-a-number has no JSON form, so failed conversions become null.
fn to_number(value: Value) -> Value {
    match value {
        Value::Number(_) => value,
        Value::Bool(b) => Value::from(u8::from(b)),
        Value::Null => Value::from(0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::from(0)
            } else if let Ok(i) = trimmed.parse::<i64>() {
                Value::from(i)
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Value::Array(_) | Value::Object(_) => Value::Null,
    }
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        Value::Null => Value::String("null".to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_string()),
    }
}
