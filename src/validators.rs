//! Property validators and the built-in ones.
//!
//! A validator receives the property value (`None` when absent), the property
//! name and the owning record. `Err(payload)` reports a failure; the payload
//! can be any JSON shape and ends up verbatim in the aggregate `details`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EntityError;
use crate::types::{Field, Record};

type Check = dyn Fn(Option<&Field>, &str, &Record) -> Result<(), Value> + Send + Sync;

/// A named, shareable validation function.
///
/// Equality is identity: two validators are equal only if one is a clone of
/// the other.
#[derive(Clone)]
pub struct Validator {
    name: Arc<str>,
    check: Arc<Check>,
}

impl Validator {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&Field>, &str, &Record) -> Result<(), Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the validator.
    ///
    /// # Errors
    ///
    /// Returns the validator's failure payload.
    pub fn check(&self, value: Option<&Field>, property: &str, owner: &Record) -> Result<(), Value> {
        (self.check)(value, property, owner)
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.check) as *const (),
            Arc::as_ptr(&other.check) as *const (),
        )
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.name()).finish()
    }
}

/// Accepts every value, including an absent one.
pub fn allow_any() -> Validator {
    Validator::new("allowAny", |_, _, _| Ok(()))
}

/// Rejects every value, including an absent one.
pub fn forbid_any() -> Validator {
    Validator::new("forbidAny", |_, property, _| {
        Err(Value::String(format!(
            "Field {} does not accept any value",
            property
        )))
    })
}

/// Defer to the nested entity's (or collection's) own validation.
///
/// The nested value is validated in `context` (the default context when
/// `None`), and its structured `details` become this property's error. An
/// absent value passes unless `required` is set.
pub fn delegate(context: Option<&str>, required: bool) -> Validator {
    let context = context.unwrap_or_default().to_string();

    Validator::new("delegate", move |value, property, _| match value {
        None if required => Err(Value::String(format!("{} is required", property))),
        None => Ok(()),
        Some(Field::Entity(entity)) => entity
            .validate(&context)
            .map(|_| ())
            .map_err(delegated_error),
        Some(Field::Collection(collection)) => collection
            .validate(&context)
            .map(|_| ())
            .map_err(delegated_error),
        Some(Field::Json(_)) => Err(Value::String(format!(
            "{} is not an entity and cannot be validated",
            property
        ))),
    })
}

fn delegated_error(err: EntityError) -> Value {
    match err {
        EntityError::Validation(e) => e.details_json(),
        other => Value::String(other.to_string()),
    }
}
