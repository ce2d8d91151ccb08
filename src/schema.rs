//! Schema building: expands a property definition map and named contexts
//! into a schema family.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::EntityError;
use crate::types::{
    normalize_context, ContextDefinition, PropertyDefinition, ResolvedProperty, DEFAULT_CONTEXT,
};
use crate::validators::allow_any;

/// Resolved properties of one context, keyed by property name.
pub type Schema = BTreeMap<String, ResolvedProperty>;

/// Every schema derived from one definition, keyed by context name.
///
/// Always contains [`DEFAULT_CONTEXT`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFamily {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaFamily {
    pub fn get(&self, context: &str) -> Option<&Schema> {
        self.schemas.get(context)
    }

    pub fn default_schema(&self) -> &Schema {
        // Inserted unconditionally by `build_schema`.
        &self.schemas[DEFAULT_CONTEXT]
    }

    /// Look up a context, treating an empty name as the default context.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` if the family has no such context.
    pub fn resolve(&self, context: &str) -> Result<&Schema, EntityError> {
        let name = normalize_context(context);
        self.schemas
            .get(name)
            .ok_or_else(|| EntityError::InvalidContext {
                context: name.to_string(),
            })
    }

    pub fn contains(&self, context: &str) -> bool {
        self.schemas.contains_key(normalize_context(context))
    }

    pub fn context_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Describe every context as JSON: context → property → settings.
    pub fn describe(&self) -> Value {
        Value::Object(
            self.schemas
                .iter()
                .map(|(name, schema)| (name.clone(), describe_schema(schema)))
                .collect(),
        )
    }
}

/// Describe one schema as JSON: property → settings.
pub fn describe_schema(schema: &Schema) -> Value {
    let map: Map<String, Value> = schema
        .iter()
        .map(|(name, prop)| (name.clone(), prop.describe()))
        .collect();
    Value::Object(map)
}

/// Build the schema family for a definition.
///
/// The `default` schema holds every property with its validator defaulted to
/// `allow_any`. Each named context is derived from the default schema alone;
/// contexts never build on each other.
pub fn build_schema(
    definition: &BTreeMap<String, PropertyDefinition>,
    contexts: &BTreeMap<String, ContextDefinition>,
) -> SchemaFamily {
    let default_schema: Schema = definition
        .iter()
        .map(|(name, def)| (name.clone(), resolve_property(def)))
        .collect();

    let mut schemas = BTreeMap::new();
    for (name, context) in contexts {
        if name == DEFAULT_CONTEXT {
            warn!(context = %name, "context named \"default\" is ignored; the default schema cannot be overridden");
            continue;
        }
        schemas.insert(name.clone(), derive_context(name, &default_schema, context));
    }
    schemas.insert(DEFAULT_CONTEXT.to_string(), default_schema);

    debug!(
        properties = definition.len(),
        contexts = schemas.len(),
        "built schema family"
    );

    SchemaFamily { schemas }
}

fn resolve_property(def: &PropertyDefinition) -> ResolvedProperty {
    ResolvedProperty {
        validator: def.validator.clone().unwrap_or_else(allow_any),
        factory: def.factory.clone(),
        default: def.default.clone(),
        read_only: def.read_only,
        skippable: def.skippable,
    }
}

fn derive_context(name: &str, default_schema: &Schema, context: &ContextDefinition) -> Schema {
    if !context.include.is_empty() && !context.exclude.is_empty() {
        warn!(
            context = %name,
            "both $include and $exclude are set; $include takes precedence"
        );
    }

    let mut schema = if !context.include.is_empty() {
        pick(default_schema, &context.include)
    } else if !context.exclude.is_empty() {
        omit(default_schema, &context.exclude)
    } else {
        default_schema.clone()
    };

    // Patches only ever target keys that survived the filter above.
    for (property, validator) in &context.modify {
        match schema.get_mut(property) {
            Some(prop) => prop.validator = validator.clone(),
            None => debug!(context = %name, property = %property, "$modify target not in context"),
        }
    }

    for property in &context.skip {
        match schema.get_mut(property) {
            Some(prop) => prop.skippable = true,
            None => debug!(context = %name, property = %property, "$skip target not in context"),
        }
    }

    schema
}

/// Entries of `map` whose key is listed in `keys`.
pub(crate) fn pick<V: Clone>(map: &BTreeMap<String, V>, keys: &[String]) -> BTreeMap<String, V> {
    map.iter()
        .filter(|(k, _)| keys.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Entries of `map` whose key is not listed in `keys`.
pub(crate) fn omit<V: Clone>(map: &BTreeMap<String, V>, keys: &[String]) -> BTreeMap<String, V> {
    map.iter()
        .filter(|(k, _)| !keys.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
