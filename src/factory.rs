//! Entity factories and the entities they build.
//!
//! A factory is built once from a [`SchemaDefinition`]. It resolves the schema
//! family and the default values up front and shares them, immutable, with
//! every entity it creates:
//!
//! ```
//! use entity_schema::{forbid_any, ContextDefinition, EntityFactory, PropertyDefinition, SchemaDefinition};
//! use serde_json::json;
//!
//! let users = EntityFactory::new(
//!     SchemaDefinition::new()
//!         .property("id", PropertyDefinition::new().read_only())
//!         .property("name", PropertyDefinition::new().default_value("anonymous"))
//!         .context("create", ContextDefinition::new().modify("id", forbid_any())),
//! );
//!
//! let user = users.create(json!({ "name": "Ada", "role": "admin" }));
//! assert_eq!(user.to_json("").unwrap(), json!({ "name": "Ada" }));
//! assert!(user.validate("create").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::error::EntityError;
use crate::nested::wrap;
use crate::projection::to_json;
use crate::schema::{build_schema, SchemaFamily};
use crate::types::{
    is_truthy, json_type_name, normalize_context, FactoryOptions, Field, Method, Record,
    SchemaDefinition,
};
use crate::validate::validate;

/// Capabilities shared by entities and collections.
pub trait Model {
    /// Project into plain JSON using the named context.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` for an unknown context.
    fn to_json(&self, context: &str) -> Result<Value, EntityError>;

    /// Validate using the named context, returning `self` on success.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` for an unknown context or
    /// `EntityError::Validation` with every failure.
    fn validate(&self, context: &str) -> Result<&Self, EntityError>;
}

/// State computed once per factory and shared by all of its entities.
struct Blueprint {
    family: SchemaFamily,
    defaults: BTreeMap<String, Value>,
    methods: BTreeMap<String, Method>,
}

/// Builds [`Entity`] values for one schema definition.
///
/// Cloning is cheap; clones share the same schema family.
#[derive(Clone)]
pub struct EntityFactory {
    blueprint: Arc<Blueprint>,
}

impl EntityFactory {
    pub fn new(definition: SchemaDefinition) -> Self {
        let SchemaDefinition {
            properties,
            methods,
            contexts,
        } = definition;

        let family = build_schema(&properties, &contexts);

        let defaults = properties
            .iter()
            .filter_map(|(name, prop)| match &prop.default {
                Some(value) if is_truthy(value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect();

        Self {
            blueprint: Arc::new(Blueprint {
                family,
                defaults,
                methods,
            }),
        }
    }

    pub fn schema_family(&self) -> &SchemaFamily {
        &self.blueprint.family
    }

    /// Default values merged into every new entity.
    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.blueprint.defaults
    }

    /// Build an entity with default options.
    pub fn create(&self, data: impl Into<Field>) -> Entity {
        self.create_with(data, FactoryOptions::default())
    }

    /// Build an entity.
    ///
    /// `data` may be a JSON object or any entity with a compatible shape.
    /// Anything else is treated as empty data. Keys the schema does not
    /// declare and `null` values are dropped.
    pub fn create_with(&self, data: impl Into<Field>, options: FactoryOptions) -> Entity {
        let source: Record = match data.into() {
            Field::Json(Value::Object(map)) => {
                map.into_iter().map(|(k, v)| (k, Field::Json(v))).collect()
            }
            Field::Entity(entity) => entity.record,
            Field::Json(other) => {
                debug!(kind = json_type_name(&other), "non-object entity data treated as empty");
                Record::new()
            }
            Field::Collection(_) => {
                debug!("collection passed as entity data, treated as empty");
                Record::new()
            }
        };

        let schema = self.blueprint.family.default_schema();

        let mut merged: Record = if options.ignore_defaults {
            Record::new()
        } else {
            self.blueprint
                .defaults
                .iter()
                .map(|(k, v)| (k.clone(), Field::Json(v.clone())))
                .collect()
        };

        let mut dropped = 0usize;
        for (key, value) in source {
            if value.is_null() {
                continue;
            }
            if !schema.contains_key(&key) {
                dropped += 1;
                continue;
            }
            merged.insert(key, value);
        }
        if dropped > 0 {
            debug!(dropped, "ignored undeclared properties");
        }

        let record = merged
            .into_iter()
            .filter_map(|(key, value)| {
                let factory = schema.get(&key).and_then(|p| p.factory.as_ref());
                wrap(factory, value).map(|field| (key, field))
            })
            .collect();

        Entity {
            record,
            blueprint: Arc::clone(&self.blueprint),
        }
    }
}

impl PartialEq for EntityFactory {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.blueprint, &other.blueprint)
    }
}

impl fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFactory")
            .field(
                "contexts",
                &self.blueprint.family.context_names().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An instance built by an [`EntityFactory`].
///
/// Holds only the declared properties that were present in the source data
/// (after defaults). Equality compares data only, never the factory.
#[derive(Clone)]
pub struct Entity {
    record: Record,
    blueprint: Arc<Blueprint>,
}

impl Entity {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.record.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.record.contains_key(name)
    }

    /// Assign a property, running it through the property's factory first.
    ///
    /// Assigning `null` to a property with a factory removes it.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::UnknownProperty` for undeclared names and
    /// `EntityError::ReadOnly` for read-only properties; the entity is left
    /// unchanged in both cases.
    pub fn set(&mut self, name: &str, value: impl Into<Field>) -> Result<(), EntityError> {
        let prop = self
            .blueprint
            .family
            .default_schema()
            .get(name)
            .ok_or_else(|| EntityError::UnknownProperty {
                property: name.to_string(),
            })?;

        if prop.read_only {
            return Err(EntityError::ReadOnly {
                property: name.to_string(),
            });
        }

        match wrap(prop.factory.as_ref(), value.into()) {
            Some(field) => {
                self.record.insert(name.to_string(), field);
            }
            None => {
                self.record.remove(name);
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.record.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.record.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// The factory that produced this entity.
    pub fn factory(&self) -> EntityFactory {
        EntityFactory {
            blueprint: Arc::clone(&self.blueprint),
        }
    }

    pub fn schema_family(&self) -> &SchemaFamily {
        &self.blueprint.family
    }

    /// Project into plain JSON using the named context (`""` = default).
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` for an unknown context.
    pub fn to_json(&self, context: &str) -> Result<Value, EntityError> {
        let schema = self.blueprint.family.resolve(context)?;
        Ok(to_json(schema, &self.record))
    }

    /// Validate using the named context (`""` = default).
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` for an unknown context or
    /// `EntityError::Validation` listing every failing property.
    pub fn validate(&self, context: &str) -> Result<&Self, EntityError> {
        let schema = self.blueprint.family.resolve(context)?;
        debug!(context = normalize_context(context), "validating entity");
        validate(schema, &self.record)?;
        Ok(self)
    }

    /// Call a shared method bound to this entity.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::UnknownMethod` if the definition has no such
    /// method.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, EntityError> {
        let m = self
            .blueprint
            .methods
            .get(method)
            .ok_or_else(|| EntityError::UnknownMethod {
                method: method.to_string(),
            })?;
        Ok(m.invoke(self, args))
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.blueprint.methods.contains_key(method)
    }

    pub(crate) fn project_default(&self) -> Value {
        to_json(self.blueprint.family.default_schema(), &self.record)
    }
}

impl Model for Entity {
    fn to_json(&self, context: &str) -> Result<Value, EntityError> {
        Entity::to_json(self, context)
    }

    fn validate(&self, context: &str) -> Result<&Self, EntityError> {
        Entity::validate(self, context)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.record.iter()).finish()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.project_default().serialize(serializer)
    }
}
