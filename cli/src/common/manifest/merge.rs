//! # Manifest Merging
//!
//! File: cli/src/common/manifest/merge.rs
//!
//! Key-wise merging of JSON documents with override semantics. Objects are merged
//! recursively; for every other value the later document wins. How arrays are treated
//! is chosen by `ArrayMerge`:
//!
//! - `Replace` (used by `merge`): an array is a value like any other and is replaced.
//! - `Union`: elements of the later array that are not already present are appended.
//!   Used when combining the manifests of several packages, where lists such as
//!   `repositories` or `autoload.classmap` must accumulate.
//!
//! Both strategies are idempotent: merging a document into itself changes nothing.
//!
use serde_json::Value;

/// How arrays found at the same key are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
    #[default]
    Replace,
    Union,
}

/// Merges `overlay` into `base`; the later source wins per key.
pub fn merge(base: &mut Value, overlay: Value) {
    merge_with(base, overlay, ArrayMerge::Replace);
}

pub fn merge_with(base: &mut Value, overlay: Value, arrays: ArrayMerge) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_with(existing, value, arrays),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base_items), Value::Array(overlay_items)) if arrays == ArrayMerge::Union => {
            for item in overlay_items {
                if !base_items.contains(&item) {
                    base_items.push(item);
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Folds `documents` left to right into one, starting from an empty object.
pub fn merge_all<I>(documents: I, arrays: ArrayMerge) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut merged = Value::Object(serde_json::Map::new());
    for document in documents {
        merge_with(&mut merged, document, arrays);
    }
    merged
}
