//! Case-insensitive comparison helpers for paths and header maps.

use std::collections::HashMap;

/// Header name to ordered list of values.
pub type HeaderMap = HashMap<String, Vec<String>>;

/// Normalize a URL path for indexing and comparison.
pub fn normalize_path(path: &str) -> String {
    path.to_lowercase()
}

/// Compare two paths ignoring case.
pub fn paths_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Lower-case every key, leaving values untouched.
///
/// Values of keys that collide after lower-casing are concatenated.
pub fn lowercase_keys(headers: &HeaderMap) -> HeaderMap {
    let mut result = HeaderMap::with_capacity(headers.len());
    for (key, values) in headers {
        result
            .entry(key.to_lowercase())
            .or_insert_with(Vec::new)
            .extend(values.iter().cloned());
    }
    result
}

/// Lower-case both keys and values.
pub fn lowercase_map(headers: &HeaderMap) -> HeaderMap {
    let mut result = HeaderMap::with_capacity(headers.len());
    for (key, values) in headers {
        result
            .entry(key.to_lowercase())
            .or_insert_with(Vec::new)
            .extend(values.iter().map(|v| v.to_lowercase()));
    }
    result
}

/// True when every value in `required` occurs in `available`.
pub fn contains_all(available: &[String], required: &[String]) -> bool {
    required.iter().all(|value| available.contains(value))
}

/// True when every key of `subset` exists in `superset` and carries
/// all of the subset's values. Both maps must already be normalized.
pub fn is_header_subset(subset: &HeaderMap, superset: &HeaderMap) -> bool {
    subset.iter().all(|(key, values)| {
        superset
            .get(key)
            .map(|available| contains_all(available, values))
            .unwrap_or(false)
    })
}
