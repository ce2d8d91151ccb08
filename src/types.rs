//! Core types for schema definitions and entity data.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::collection::Collection;
use crate::factory::Entity;
use crate::nested::PropertyFactory;
use crate::validators::Validator;

/// Name of the context every schema family contains.
pub const DEFAULT_CONTEXT: &str = "default";

/// Reserved top-level key holding context definitions.
pub const CONTEXTS_KEY: &str = "$contexts";

/// Reserved top-level key holding shared entity methods.
pub const METHODS_KEY: &str = "$methods";

/// Data of a single entity, keyed by property name.
pub type Record = BTreeMap<String, Field>;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a context argument: an empty name means the default context.
///
/// Serialization call sites pass an empty string where no context was given,
/// so this rule has to hold everywhere a context name is accepted.
pub fn normalize_context(context: &str) -> &str {
    if context.is_empty() {
        DEFAULT_CONTEXT
    } else {
        context
    }
}

/// JavaScript-style truthiness, used to decide which defaults apply.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A value held by an entity property.
///
/// A missing property is represented by the absence of its key in the
/// [`Record`], never by a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Plain JSON data.
    Json(Value),
    /// A nested entity built by a child factory.
    Entity(Entity),
    /// A nested collection built by a collection factory.
    Collection(Collection),
}

impl Field {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Field::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Field::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Field::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Field::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// True for JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Json(Value::Null))
    }

    /// Plain JSON form of this field.
    ///
    /// Nested entities and collections are projected through their default
    /// context.
    pub fn to_json_value(&self) -> Value {
        match self {
            Field::Json(value) => value.clone(),
            Field::Entity(entity) => entity.project_default(),
            Field::Collection(collection) => collection.project_default(),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Json(value) => value.serialize(serializer),
            Field::Entity(entity) => entity.serialize(serializer),
            Field::Collection(collection) => collection.serialize(serializer),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Json(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Json(Value::String(value.to_string()))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Json(Value::String(value))
    }
}

impl From<Entity> for Field {
    fn from(entity: Entity) -> Self {
        Field::Entity(entity)
    }
}

impl From<&Entity> for Field {
    fn from(entity: &Entity) -> Self {
        Field::Entity(entity.clone())
    }
}

impl From<Collection> for Field {
    fn from(collection: Collection) -> Self {
        Field::Collection(collection)
    }
}

impl From<&Collection> for Field {
    fn from(collection: &Collection) -> Self {
        Field::Collection(collection.clone())
    }
}

/// Raw configuration of one schema property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDefinition {
    pub validator: Option<Validator>,
    /// Nested factory or primitive coercion applied to incoming values.
    pub factory: Option<PropertyFactory>,
    pub default: Option<Value>,
    pub read_only: bool,
    /// Exempt from validation while the value is absent.
    pub skippable: bool,
}

impl PropertyDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn factory(mut self, factory: impl Into<PropertyFactory>) -> Self {
        self.factory = Some(factory.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }
}

/// A property definition after schema resolution: the validator is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperty {
    pub validator: Validator,
    pub factory: Option<PropertyFactory>,
    pub default: Option<Value>,
    pub read_only: bool,
    pub skippable: bool,
}

impl ResolvedProperty {
    /// Describe this property as JSON (validator and factory by name).
    pub fn describe(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("validator".into(), Value::String(self.validator.name().into()));
        if let Some(factory) = &self.factory {
            map.insert("factory".into(), Value::String(factory.describe()));
        }
        if let Some(default) = &self.default {
            map.insert("default".into(), default.clone());
        }
        map.insert("readOnly".into(), Value::Bool(self.read_only));
        map.insert("skippable".into(), Value::Bool(self.skippable));
        Value::Object(map)
    }
}

/// Operators deriving one named context from the default schema.
///
/// `include` takes precedence over `exclude`; `modify` and `skip` only touch
/// properties that survive that filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDefinition {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Replacement validators by property name.
    pub modify: BTreeMap<String, Validator>,
    /// Properties forced to skippable in this context.
    pub skip: Vec<String>,
}

impl ContextDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn modify(mut self, name: impl Into<String>, validator: Validator) -> Self {
        self.modify.insert(name.into(), validator);
        self
    }

    pub fn skip<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }
}

/// A shared entity method, called with the entity it is bound to.
#[derive(Clone)]
pub struct Method(Arc<dyn Fn(&Entity, &[Value]) -> Value + Send + Sync>);

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Entity, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn invoke(&self, entity: &Entity, args: &[Value]) -> Value {
        (self.0)(entity, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

/// Everything an entity factory is built from.
///
/// `methods` and `contexts` correspond to the reserved `$methods` and
/// `$contexts` keys and are never treated as data properties.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    pub properties: BTreeMap<String, PropertyDefinition>,
    pub methods: BTreeMap<String, Method>,
    pub contexts: BTreeMap<String, ContextDefinition>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }

    pub fn context(mut self, name: impl Into<String>, definition: ContextDefinition) -> Self {
        self.contexts.insert(name.into(), definition);
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Entity, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Method::new(f));
        self
    }
}

/// Options for a single factory call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactoryOptions {
    /// When true, schema defaults are not merged under the data.
    pub ignore_defaults: bool,
}

impl FactoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_defaults(mut self, ignore: bool) -> Self {
        self.ignore_defaults = ignore;
        self
    }
}
