//! JSON tree helpers shared by the store backends
//!
//! Objects are directories, everything else is a leaf. Children keep their
//! insertion order.

use serde_json::{Map, Value};

/// Split a `/`-delimited path, ignoring empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn lookup<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    segs.iter().try_fold(root, |node, seg| node.as_object()?.get(*seg))
}

/// Render a node for `get`: non-recursive reads collapse child directories to `{}`
pub fn render(node: &Value, recursive: bool) -> Value {
    match node {
        Value::Object(children) if !recursive => Value::Object(
            children
                .iter()
                .map(|(k, v)| {
                    let v = if v.is_object() {
                        Value::Object(Map::new())
                    } else {
                        v.clone()
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Child names for `list`; `flat` keeps leaves only, and an empty
/// directory counts as a leaf
pub fn children(node: &Value, recursive: bool, flat: bool) -> Vec<String> {
    let mut out = Vec::new();
    collect(node, "", recursive, flat, &mut out);
    out.sort();
    out
}

fn collect(node: &Value, prefix: &str, recursive: bool, flat: bool, out: &mut Vec<String>) {
    let Some(map) = node.as_object() else {
        return;
    };
    for (name, child) in map {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        let is_dir = child.as_object().is_some_and(|m| !m.is_empty());
        if !flat || !is_dir {
            out.push(path.clone());
        }
        if recursive && is_dir {
            collect(child, &path, recursive, flat, out);
        }
    }
}

/// Write `value` at `segs`, creating (or replacing leaves with) directories on the way
pub fn insert(root: &mut Value, segs: &[&str], value: Value) {
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for seg in parents {
        node = ensure_dir(node)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_dir(node).insert(last.to_string(), value);
}

fn ensure_dir(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made a directory"),
    }
}

/// Delete the subtree at `segs`; returns whether anything was removed
pub fn remove(root: &mut Value, segs: &[&str]) -> bool {
    let Some((last, parents)) = segs.split_last() else {
        let existed = root.as_object().is_some_and(|m| !m.is_empty());
        *root = Value::Object(Map::new());
        return existed;
    };
    let mut node = root;
    for seg in parents {
        match node.as_object_mut().and_then(|m| m.get_mut(*seg)) {
            Some(next) => node = next,
            None => return false,
        }
    }
    node.as_object_mut()
        .map(|m| m.shift_remove(*last).is_some())
        .unwrap_or(false)
}

/// Flatten a value into `(path, leaf)` pairs; empty directories stay as `{}` leaves
pub fn flatten(prefix: &str, value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(prefix, value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten_into(&format!("{}/{}", prefix, k), v, out);
            }
        }
        other => out.push((prefix.to_string(), other.clone())),
    }
}
