//! Error types for entity construction, validation and definition loading.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Machine-readable code carried by every aggregate validation failure.
pub const VALIDATION_ERROR_CODE: &str = "ERR_VALIDATION";

/// Aggregate validation failure.
///
/// `details` maps each failing property (or `item#<index>` for collections)
/// to the raw payload its validator reported. Passing properties never
/// appear.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    code: &'static str,
    pub details: BTreeMap<String, Value>,
}

impl ValidationError {
    pub fn new(details: BTreeMap<String, Value>) -> Self {
        Self {
            message: format!("validation failed with {} error(s)", details.len()),
            code: VALIDATION_ERROR_CODE,
            details,
        }
    }

    /// Always [`VALIDATION_ERROR_CODE`].
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// The details as a JSON object, used when nesting failures.
    pub fn details_json(&self) -> Value {
        Value::Object(
            self.details
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Errors raised by entities, collections and their factories.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    #[error("invalid context \"{context}\"")]
    InvalidContext { context: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot assign to read-only property \"{property}\"")]
    ReadOnly { property: String },

    #[error("unknown property \"{property}\"")]
    UnknownProperty { property: String },

    #[error("unknown method \"{method}\"")]
    UnknownMethod { method: String },
}

impl EntityError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EntityError::Validation(_) => 1,
            _ => 2,
        }
    }
}

/// Errors while loading a schema definition.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definition at {path}: {message}")]
    InvalidDefinition { path: String, message: String },

    #[error("invalid JSON Schema: {message}")]
    InvalidSchema { message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}
