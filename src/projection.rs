//! JSON projection of entity records.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::Record;

/// Project the schema's keys of `data` into a plain JSON object.
///
/// Keys missing from `data` are left out, as are keys the schema does not
/// declare. Nested entities and collections are projected recursively.
pub fn to_json(schema: &Schema, data: &Record) -> Value {
    let map: Map<String, Value> = schema
        .keys()
        .filter_map(|key| data.get(key).map(|field| (key.clone(), field.to_json_value())))
        .collect();
    Value::Object(map)
}
