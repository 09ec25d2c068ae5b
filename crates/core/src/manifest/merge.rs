use serde_json::{Map, Value};

/// Shallow merge: every top-level key of `patch` overwrites the same key in
/// `base`; keys only present in `base` are kept untouched.
pub fn merge_shallow(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Merged copy of `base` and `patch`, same rule as [`merge_shallow`].
pub fn merged(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    merge_shallow(&mut out, patch.clone());
    out
}
