//! Entity Schema
//!
//! Context-scoped schema families and the entity factories built on them.
//!
//! A [`SchemaDefinition`] declares properties (validator, nested factory,
//! default, read-only, skippable) and named contexts. Each context derives a
//! variant of the default schema with `$include`, `$exclude`, `$modify` and
//! `$skip`. An [`EntityFactory`] built from the definition creates entities
//! that validate and project themselves against any schema of the family.
//!
//! # Example
//!
//! ```
//! use entity_schema::{
//!     delegate, forbid_any, CollectionFactory, ContextDefinition, EntityError, EntityFactory,
//!     PropertyDefinition, SchemaDefinition,
//! };
//! use serde_json::json;
//!
//! let tags = EntityFactory::new(
//!     SchemaDefinition::new().property("label", PropertyDefinition::new()),
//! );
//!
//! let posts = EntityFactory::new(
//!     SchemaDefinition::new()
//!         .property("id", PropertyDefinition::new().read_only())
//!         .property("title", PropertyDefinition::new().default_value("untitled"))
//!         .property(
//!             "tags",
//!             PropertyDefinition::new()
//!                 .factory(CollectionFactory::new(tags))
//!                 .validator(delegate(None, false)),
//!         )
//!         .context(
//!             "create",
//!             ContextDefinition::new().modify("id", forbid_any()),
//!         ),
//! );
//!
//! let mut post = posts.create(json!({ "id": "p1", "tags": [{ "label": "rust" }] }));
//! assert_eq!(
//!     post.to_json("").unwrap(),
//!     json!({ "id": "p1", "tags": [{ "label": "rust" }], "title": "untitled" })
//! );
//!
//! // Read-only properties refuse assignment.
//! assert!(matches!(post.set("id", "p2"), Err(EntityError::ReadOnly { .. })));
//!
//! // The "create" context forbids an id.
//! assert!(post.validate("").is_ok());
//! assert!(post.validate("create").is_err());
//! ```
//!
//! # Context Operators
//!
//! | Operator | Effect on the derived schema |
//! |------------|------------------------------------------------------|
//! | `$include` | Keep only the listed properties (wins over `$exclude`) |
//! | `$exclude` | Drop the listed properties |
//! | `$modify` | Replace the validator of surviving properties |
//! | `$skip` | Mark surviving properties skippable |

mod adapters;
mod collection;
mod error;
mod factory;
mod linter;
mod loader;
mod nested;
mod projection;
mod schema;
mod types;
mod validate;
mod validators;

pub use adapters::json_schema;
pub use collection::{Collection, CollectionFactory};
pub use error::{EntityError, LoadError, ValidationError, VALIDATION_ERROR_CODE};
pub use factory::{Entity, EntityFactory, Model};
pub use linter::{
    check_definition, lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity,
};
pub use loader::{load_definition, load_definition_str, load_json, parse_definition, parse_validator};
pub use nested::{Coercion, PropertyFactory};
pub use projection::to_json;
pub use schema::{build_schema, describe_schema, Schema, SchemaFamily};
pub use types::{
    json_type_name, normalize_context, ContextDefinition, FactoryOptions, Field, Method,
    PropertyDefinition, Record, ResolvedProperty, SchemaDefinition, CONTEXTS_KEY,
    DEFAULT_CONTEXT, METHODS_KEY,
};
pub use validate::{collect_errors, validate};
pub use validators::{allow_any, delegate, forbid_any, Validator};
