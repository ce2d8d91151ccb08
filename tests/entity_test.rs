//! Integration tests for entity and collection factories.

use std::thread;

use entity_schema::{
    delegate, forbid_any, Collection, CollectionFactory, ContextDefinition, Entity, EntityError,
    EntityFactory, FactoryOptions, Field, Model, PropertyDefinition, SchemaDefinition,
    VALIDATION_ERROR_CODE,
};
use serde_json::{json, Value};

fn child_factory() -> EntityFactory {
    EntityFactory::new(
        SchemaDefinition::new()
            .property("name", PropertyDefinition::new())
            .property("age", PropertyDefinition::new()),
    )
}

fn parent_factory(child: &EntityFactory) -> EntityFactory {
    EntityFactory::new(
        SchemaDefinition::new()
            .property("title", PropertyDefinition::new())
            .property(
                "child",
                PropertyDefinition::new()
                    .factory(child.clone())
                    .validator(delegate(None, false)),
            ),
    )
}

fn validation_details(err: EntityError) -> Value {
    match err {
        EntityError::Validation(e) => {
            assert_eq!(e.code(), VALIDATION_ERROR_CODE);
            e.details_json()
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// === Nested Entities ===

mod nested {
    use super::*;

    #[test]
    fn child_is_built_by_child_factory() {
        let child = child_factory();
        let parent = parent_factory(&child);
        let data = json!({ "name": "Ada", "age": 36 });

        let entity = parent.create(json!({ "title": "t", "child": data.clone() }));

        assert_eq!(entity.get("child"), Some(&Field::Entity(child.create(data))));
        let built = entity.get("child").and_then(Field::as_entity).unwrap();
        assert_eq!(built.factory(), child);
    }

    #[test]
    fn child_extra_properties_are_stripped() {
        let parent = parent_factory(&child_factory());
        let entity = parent.create(json!({ "child": { "name": "Ada", "extra": true } }));

        assert_eq!(
            entity.to_json("").unwrap(),
            json!({ "child": { "name": "Ada" } })
        );
    }

    #[test]
    fn missing_child_is_absent() {
        let parent = parent_factory(&child_factory());
        let entity = parent.create(json!({ "title": "t" }));

        assert!(!entity.contains("child"));
        assert_eq!(entity.to_json("").unwrap(), json!({ "title": "t" }));
    }

    #[test]
    fn assigning_plain_data_builds_child() {
        let child = child_factory();
        let mut entity = parent_factory(&child).create(json!({}));

        entity.set("child", json!({ "name": "Grace" })).unwrap();
        assert_eq!(
            entity.get("child").and_then(Field::as_entity),
            Some(&child.create(json!({ "name": "Grace" })))
        );
    }

    #[test]
    fn nested_failures_keep_their_structure() {
        let child = EntityFactory::new(
            SchemaDefinition::new()
                .property("name", PropertyDefinition::new().validator(forbid_any())),
        );
        let parent = parent_factory(&child);
        let entity = parent.create(json!({ "title": "t", "child": { "name": "Ada" } }));

        let details = validation_details(entity.validate("").unwrap_err());
        assert_eq!(
            details,
            json!({ "child": { "name": "Field name does not accept any value" } })
        );
    }

    #[test]
    fn nested_collection_projection() {
        let tags = CollectionFactory::new(EntityFactory::new(
            SchemaDefinition::new().property("label", PropertyDefinition::new()),
        ));
        let posts = EntityFactory::new(
            SchemaDefinition::new()
                .property("title", PropertyDefinition::new())
                .property("tags", PropertyDefinition::new().factory(tags)),
        );

        let post = posts.create(json!({
            "title": "hello",
            "tags": [{ "label": "a", "color": "red" }, { "label": "b" }]
        }));

        assert_eq!(
            post.to_json("").unwrap(),
            json!({ "title": "hello", "tags": [{ "label": "a" }, { "label": "b" }] })
        );
        let tags = post.get("tags").and_then(Field::as_collection).unwrap();
        assert_eq!(tags.len(), 2);
    }
}

// === Defaults and Read-only ===

mod defaults {
    use super::*;

    fn factory() -> EntityFactory {
        EntityFactory::new(
            SchemaDefinition::new()
                .property("id", PropertyDefinition::new().read_only())
                .property("status", PropertyDefinition::new().default_value("draft")),
        )
    }

    #[test]
    fn default_fills_missing_value() {
        let entity = factory().create(json!({}));
        assert_eq!(entity.to_json("").unwrap(), json!({ "status": "draft" }));
    }

    #[test]
    fn data_overrides_default() {
        let entity = factory().create(json!({ "status": "published" }));
        assert_eq!(entity.get("status"), Some(&Field::from("published")));
    }

    #[test]
    fn ignore_defaults_skips_them() {
        let entity = factory().create_with(json!({}), FactoryOptions::new().ignore_defaults(true));
        assert!(entity.is_empty());
    }

    #[test]
    fn read_only_assignment_fails_and_keeps_value() {
        let mut entity = factory().create(json!({ "id": "abc" }));

        let err = entity.set("id", "other").unwrap_err();
        assert_eq!(
            err,
            EntityError::ReadOnly {
                property: "id".into()
            }
        );
        assert_eq!(entity.get("id"), Some(&Field::from("abc")));
    }

    #[test]
    fn writable_assignment_succeeds() {
        let mut entity = factory().create(json!({}));
        entity.set("status", "done").unwrap();
        assert_eq!(entity.get("status"), Some(&Field::from("done")));
    }
}

// === Round Trips ===

mod round_trip {
    use super::*;

    #[test]
    fn rebuilding_from_entity_preserves_projection() {
        let factory = parent_factory(&child_factory());
        let entity = factory.create(json!({ "title": "t", "child": { "name": "Ada" } }));

        let rebuilt = factory.create(&entity);
        assert_eq!(rebuilt.to_json("").unwrap(), entity.to_json("").unwrap());
        assert_eq!(rebuilt, entity);
    }

    #[test]
    fn entity_from_another_factory_is_reshaped() {
        let wide = EntityFactory::new(
            SchemaDefinition::new()
                .property("name", PropertyDefinition::new())
                .property("age", PropertyDefinition::new())
                .property("email", PropertyDefinition::new()),
        );
        let narrow = child_factory();
        let source = wide.create(json!({ "name": "Ada", "age": 36, "email": "a@b.c" }));

        let reshaped = narrow.create(&source);
        assert_eq!(
            reshaped.to_json("").unwrap(),
            json!({ "name": "Ada", "age": 36 })
        );
        assert_eq!(reshaped.factory(), narrow);
    }

    #[test]
    fn serde_matches_default_projection() {
        let entity = child_factory().create(json!({ "name": "Ada" }));
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            entity.to_json("").unwrap()
        );
    }
}

// === Validation ===

mod validation {
    use super::*;

    #[test]
    fn forbidden_properties_all_reported() {
        let factory = EntityFactory::new(
            SchemaDefinition::new()
                .property("prop1", PropertyDefinition::new().validator(forbid_any()))
                .property("prop2", PropertyDefinition::new().validator(forbid_any()))
                .property("prop3", PropertyDefinition::new()),
        );
        let entity = factory.create(json!({ "prop1": "a", "prop2": "b", "prop3": "c" }));

        let details = validation_details(entity.validate("").unwrap_err());
        assert_eq!(
            details,
            json!({
                "prop1": "Field prop1 does not accept any value",
                "prop2": "Field prop2 does not accept any value"
            })
        );
    }

    #[test]
    fn skippable_absent_property_passes() {
        let factory = EntityFactory::new(
            SchemaDefinition::new()
                .property("id", PropertyDefinition::new().validator(forbid_any()))
                .context("update", ContextDefinition::new().skip(["id"])),
        );
        let entity = factory.create(json!({}));

        assert!(entity.validate("").is_err());
        assert!(entity.validate("update").is_ok());
    }

    #[test]
    fn valid_entity_returns_same_instance() {
        let entity = child_factory().create(json!({ "name": "Ada" }));
        let validated: &Entity = Model::validate(&entity, "").unwrap();
        assert!(std::ptr::eq(validated, &entity));
    }

    #[test]
    fn empty_context_means_default() {
        let entity = child_factory().create(json!({ "name": "Ada" }));
        assert_eq!(
            entity.to_json("").unwrap(),
            entity.to_json("default").unwrap()
        );
    }
}

// === Collections ===

mod collections {
    use super::*;

    fn strict_items() -> CollectionFactory {
        CollectionFactory::new(EntityFactory::new(
            SchemaDefinition::new()
                .property("id", PropertyDefinition::new().validator(forbid_any()))
                .property("label", PropertyDefinition::new())
                .context("create", ContextDefinition::new().exclude(["id"])),
        ))
    }

    #[test]
    fn every_failing_item_is_reported() {
        let collection = strict_items().create(json!([{ "id": 1 }, { "id": 2 }]));

        let details = validation_details(collection.validate("").unwrap_err());
        assert_eq!(
            details,
            json!({
                "item#0": { "id": "Field id does not accept any value" },
                "item#1": { "id": "Field id does not accept any value" }
            })
        );
    }

    #[test]
    fn context_applies_to_every_item() {
        let collection = strict_items().create(json!([{ "id": 1, "label": "a" }, { "label": "b" }]));

        let validated: &Collection = collection.validate("create").unwrap();
        assert!(std::ptr::eq(validated, &collection));
        assert_eq!(
            collection.to_json("create").unwrap(),
            json!([{ "label": "a" }, { "label": "b" }])
        );
    }

    #[test]
    fn unknown_context_is_not_a_validation_error() {
        let collection = strict_items().create(json!([]));
        assert!(matches!(
            collection.validate("missing"),
            Err(EntityError::InvalidContext { .. })
        ));
    }
}

// === Concurrency ===

#[test]
fn factories_are_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EntityFactory>();
    assert_send_sync::<CollectionFactory>();
    assert_send_sync::<Entity>();
    assert_send_sync::<Collection>();

    let factory = child_factory();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let factory = factory.clone();
            thread::spawn(move || factory.create(json!({ "name": format!("n{i}") })))
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let entity = handle.join().unwrap();
        assert_eq!(entity.to_json("").unwrap(), json!({ "name": format!("n{i}") }));
        assert_eq!(entity.factory(), factory);
    }
}

// === Properties ===

mod properties {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Map;

    const KEYS: [&str; 3] = ["a", "b", "c"];

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,3}".prop_map(Value::from),
        ]
    }

    /// Data over declared and undeclared keys.
    fn entity_data() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-e]", scalar(), 0..6)
            .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>()))
    }

    fn factory(defaults: &[Option<Value>]) -> EntityFactory {
        let definition = KEYS.iter().zip(defaults).fold(
            SchemaDefinition::new().context("slim", ContextDefinition::new().include(["a"])),
            |definition, (key, default)| {
                let property = match default {
                    Some(value) => PropertyDefinition::new().default_value(value.clone()),
                    None => PropertyDefinition::new(),
                };
                definition.property(*key, property)
            },
        );
        EntityFactory::new(definition)
    }

    fn default_values() -> impl Strategy<Value = Vec<Option<Value>>> {
        prop::collection::vec(prop::option::of(scalar()), KEYS.len())
    }

    proptest! {
        /// Rebuilding an entity from itself never changes its projection.
        #[test]
        fn rebuild_preserves_projection(defaults in default_values(), data in entity_data()) {
            let factory = factory(&defaults);
            let entity = factory.create(data);
            let rebuilt = factory.create(&entity);
            prop_assert_eq!(rebuilt.to_json("").unwrap(), entity.to_json("").unwrap());
        }

        /// Projections only hold declared keys with non-null data or a default.
        #[test]
        fn projection_keys_are_declared_and_present(
            defaults in default_values(),
            data in entity_data(),
            ignore_defaults in any::<bool>(),
        ) {
            let factory = factory(&defaults);
            let entity = factory.create_with(
                data.clone(),
                FactoryOptions::new().ignore_defaults(ignore_defaults),
            );

            for context in ["", "slim"] {
                let projected = entity.to_json(context).unwrap();
                let schema = factory.schema_family().resolve(context).unwrap();
                for (key, value) in projected.as_object().unwrap() {
                    prop_assert!(schema.contains_key(key));
                    prop_assert!(!value.is_null());
                    let from_data = data.get(key).is_some_and(|v| !v.is_null());
                    let from_default =
                        !ignore_defaults && factory.defaults().contains_key(key);
                    prop_assert!(from_data || from_default);
                }
            }
        }

        /// Successful validation hands back the very same entity.
        #[test]
        fn validate_returns_same_instance(defaults in default_values(), data in entity_data()) {
            let entity = factory(&defaults).create(data);
            for context in ["", "default", "slim"] {
                let validated = entity.validate(context).unwrap();
                prop_assert!(std::ptr::eq(validated, &entity));
            }
        }
    }
}
