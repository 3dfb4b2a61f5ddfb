//! Merge - Recursive merge of one JSON document into another
//!
//! Objects merge key by key, arrays merge element by element (a longer source
//! array extends the destination), and any other source value replaces the
//! destination value.

use serde_json::{Map, Value};

/// Merge `source` into `destination`
pub fn deep_merge(destination: &mut Value, source: Value) {
    match (destination, source) {
        (Value::Object(dest), Value::Object(src)) => merge_maps(dest, src),
        (Value::Array(dest), Value::Array(src)) => {
            for (index, item) in src.into_iter().enumerate() {
                match dest.get_mut(index) {
                    Some(existing) => deep_merge(existing, item),
                    None => dest.push(item),
                }
            }
        }
        (dest, src) => *dest = src,
    }
}

/// Merge every entry of `source` into `destination`
pub fn merge_maps(destination: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match destination.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                destination.insert(key, value);
            }
        }
    }
}
