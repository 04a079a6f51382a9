//! Nested get/set helpers over JSON value trees
//!
//! Every field-mapper walks loosely-typed wire trees with the same two
//! primitives: read a value at a key path, write a value at a key path.
//! Keeping them here avoids per-field branching in the converters.
//!
//! A key ending in `[]` splats over the elements of an array: reading
//! `contents[]` returns the array itself, and writing distributes a list of
//! values element-wise, creating the array when missing. The pseudo-key
//! `_self` refers to the value itself.

use serde_json::{Map, Value};

/// Read the value at `keys`, returning `None` for any missing intermediate
/// step instead of erroring.
pub(crate) fn get_value_by_path(data: &Value, keys: &[&str]) -> Option<Value> {
    if keys == ["_self"] {
        return Some(data.clone());
    }
    let mut current = data;
    for (i, key) in keys.iter().enumerate() {
        if let Some(key_name) = key.strip_suffix("[]") {
            let array = current.get(key_name)?.as_array()?;
            let rest = &keys[i + 1..];
            if rest.is_empty() {
                return Some(Value::Array(array.clone()));
            }
            let mapped = array
                .iter()
                .map(|item| get_value_by_path(item, rest).unwrap_or(Value::Null))
                .collect();
            return Some(Value::Array(mapped));
        }
        current = current.get(key.to_owned())?;
    }
    if current.is_null() {
        None
    } else {
        Some(current.clone())
    }
}

/// Write `value` at `keys`, creating intermediate objects as needed.
///
/// Writing an object over an existing object merges shallowly instead of
/// replacing it, so multiple converters can attach fields to one ancestor
/// node (e.g. `generationConfig`).
pub(crate) fn set_value_by_path(data: &mut Value, keys: &[&str], value: Value) {
    let Some((&first, rest)) = keys.split_first() else {
        return;
    };
    if first == "_self" && rest.is_empty() {
        merge_or_replace(data, value);
        return;
    }
    if let Some(key_name) = first.strip_suffix("[]") {
        if rest.is_empty() {
            write_leaf(data, key_name, value);
            return;
        }
        let values = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        ensure_object(data);
        if let Some(obj) = data.as_object_mut() {
            let entry = obj
                .entry(key_name.to_string())
                .or_insert_with(|| Value::Array(vec![Value::Object(Map::new()); values.len()]));
            if let Value::Array(array) = entry {
                if array.len() < values.len() {
                    array.resize(values.len(), Value::Object(Map::new()));
                }
                for (element, item) in array.iter_mut().zip(values) {
                    set_value_by_path(element, rest, item);
                }
            }
        }
        return;
    }
    if rest.is_empty() {
        write_leaf(data, first, value);
        return;
    }
    ensure_object(data);
    if let Some(obj) = data.as_object_mut() {
        let entry = obj
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set_value_by_path(entry, rest, value);
    }
}

fn ensure_object(data: &mut Value) {
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
}

fn write_leaf(data: &mut Value, key: &str, value: Value) {
    ensure_object(data);
    if let Some(obj) = data.as_object_mut() {
        match obj.get_mut(key) {
            Some(existing) => merge_or_replace(existing, value),
            None => {
                obj.insert(key.to_string(), value);
            }
        }
    }
}

fn merge_or_replace(existing: &mut Value, value: Value) {
    match (existing, value) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                dst.insert(k, v);
            }
        }
        (dst, value) => *dst = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn get_missing_intermediate_is_none() {
        let v = json!({"a": {"b": 1}});
        assert_eq!(get_value_by_path(&v, &["a", "b"]), Some(json!(1)));
        assert_eq!(get_value_by_path(&v, &["a", "c"]), None);
        assert_eq!(get_value_by_path(&v, &["x", "y", "z"]), None);
    }

    #[test]
    fn get_null_leaf_is_none() {
        let v = json!({"a": null});
        assert_eq!(get_value_by_path(&v, &["a"]), None);
    }

    #[test]
    fn get_self_returns_value() {
        let v = json!({"a": 1});
        assert_eq!(get_value_by_path(&v, &["_self"]), Some(v.clone()));
    }

    #[test]
    fn get_array_splat_maps_remaining_path() {
        let v = json!({"contents": [{"role": "user"}, {"role": "model"}]});
        assert_eq!(
            get_value_by_path(&v, &["contents[]", "role"]),
            Some(json!(["user", "model"]))
        );
        assert_eq!(
            get_value_by_path(&v, &["contents[]"]),
            Some(json!([{"role": "user"}, {"role": "model"}]))
        );
    }

    #[test]
    fn set_creates_intermediates() {
        let mut v = json!({});
        set_value_by_path(&mut v, &["setup", "generationConfig", "topK"], json!(2));
        assert_eq!(v, json!({"setup": {"generationConfig": {"topK": 2}}}));
    }

    #[test]
    fn set_merges_objects_shallowly() {
        let mut v = json!({"generationConfig": {"temperature": 0.5}});
        set_value_by_path(&mut v, &["generationConfig"], json!({"topK": 2}));
        assert_eq!(
            v,
            json!({"generationConfig": {"temperature": 0.5, "topK": 2}})
        );
    }

    #[test]
    fn set_array_splat_distributes_values() {
        let mut v = json!({});
        set_value_by_path(&mut v, &["requests[]", "model"], json!(["m1", "m2"]));
        assert_eq!(
            v,
            json!({"requests": [{"model": "m1"}, {"model": "m2"}]})
        );
    }

    proptest! {
        #[test]
        fn set_then_get_round_trips(n in 0i64..1000) {
            let mut v = serde_json::json!({});
            set_value_by_path(&mut v, &["a", "b", "c"], serde_json::json!(n));
            prop_assert_eq!(
                get_value_by_path(&v, &["a", "b", "c"]),
                Some(serde_json::json!(n))
            );
        }

        #[test]
        fn get_never_panics_on_missing(depth in 1usize..5) {
            let keys: Vec<String> = (0..depth).map(|i| format!("k{i}")).collect();
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let v = serde_json::json!({"unrelated": 1});
            prop_assert!(get_value_by_path(&v, &refs).is_none());
        }
    }
}
