//! Collections of entities built by one item factory.

use std::collections::BTreeMap;
use std::fmt;
use std::slice;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{EntityError, ValidationError};
use crate::factory::{Entity, EntityFactory, Model};
use crate::types::{json_type_name, FactoryOptions, Field};

/// Wraps an [`EntityFactory`] to build [`Collection`]s.
#[derive(Clone, PartialEq)]
pub struct CollectionFactory {
    item: EntityFactory,
}

impl CollectionFactory {
    pub fn new(item: EntityFactory) -> Self {
        Self { item }
    }

    pub fn item_factory(&self) -> &EntityFactory {
        &self.item
    }

    /// Build a collection, eagerly running every element through the item
    /// factory.
    ///
    /// `items` may be a JSON array or another collection. Anything else
    /// yields an empty collection.
    pub fn create(&self, items: impl Into<Field>) -> Collection {
        self.create_with(items, FactoryOptions::default())
    }

    /// Like [`create`](Self::create), passing `options` to every item.
    pub fn create_with(&self, items: impl Into<Field>, options: FactoryOptions) -> Collection {
        let items: Vec<Entity> = match items.into() {
            Field::Json(Value::Array(values)) => values
                .into_iter()
                .map(|v| self.item.create_with(v, options))
                .collect(),
            Field::Collection(collection) => collection
                .items
                .into_iter()
                .map(|entity| self.item.create_with(entity, options))
                .collect(),
            Field::Json(other) => {
                debug!(kind = json_type_name(&other), "non-array collection data treated as empty");
                Vec::new()
            }
            Field::Entity(_) => {
                debug!("entity passed as collection data, treated as empty");
                Vec::new()
            }
        };

        Collection {
            items,
            factory: self.clone(),
        }
    }

    /// Build a collection from values that are already entities or raw data.
    pub fn create_from<I, T>(&self, items: I) -> Collection
    where
        I: IntoIterator<Item = T>,
        T: Into<Field>,
    {
        Collection {
            items: items.into_iter().map(|item| self.item.create(item)).collect(),
            factory: self.clone(),
        }
    }
}

impl fmt::Debug for CollectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionFactory")
            .field("item", &self.item)
            .finish()
    }
}

/// An ordered, read-only sequence of entities.
#[derive(Clone)]
pub struct Collection {
    items: Vec<Entity>,
    factory: CollectionFactory,
}

impl Collection {
    /// The `n`th entity, or `None` when out of range.
    pub fn at(&self, n: usize) -> Option<&Entity> {
        self.items.get(n)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate from the first entity; every call starts over.
    pub fn iter(&self) -> slice::Iter<'_, Entity> {
        self.items.iter()
    }

    pub fn factory(&self) -> &CollectionFactory {
        &self.factory
    }

    /// Project every entity using the named context.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` if the item schema has no such
    /// context, even when the collection is empty.
    pub fn to_json(&self, context: &str) -> Result<Value, EntityError> {
        self.check_context(context)?;
        self.items
            .iter()
            .map(|item| item.to_json(context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// Validate every entity using the named context.
    ///
    /// Failures are keyed `item#<index>`; passing items contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidContext` for an unknown context, or
    /// `EntityError::Validation` when at least one item failed.
    pub fn validate(&self, context: &str) -> Result<&Self, EntityError> {
        self.check_context(context)?;

        let mut details = BTreeMap::new();
        for (index, item) in self.items.iter().enumerate() {
            match item.validate(context) {
                Ok(_) => {}
                Err(EntityError::Validation(e)) => {
                    details.insert(format!("item#{}", index), e.details_json());
                }
                Err(other) => {
                    details.insert(format!("item#{}", index), Value::String(other.to_string()));
                }
            }
        }

        if details.is_empty() {
            Ok(self)
        } else {
            Err(ValidationError::new(details).into())
        }
    }

    pub(crate) fn project_default(&self) -> Value {
        Value::Array(self.items.iter().map(Entity::project_default).collect())
    }

    fn check_context(&self, context: &str) -> Result<(), EntityError> {
        self.factory
            .item
            .schema_family()
            .resolve(context)
            .map(|_| ())
    }
}

impl Model for Collection {
    fn to_json(&self, context: &str) -> Result<Value, EntityError> {
        Collection::to_json(self, context)
    }

    fn validate(&self, context: &str) -> Result<&Self, EntityError> {
        Collection::validate(self, context)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.project_default().serialize(serializer)
    }
}
