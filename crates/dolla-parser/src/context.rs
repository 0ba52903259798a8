// File: src/context.rs
// Purpose: Render-pass input bindings and dotted-path flattening

use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Immutable variable bindings for one render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object, e.g. `{"user": {"name": "Ada"}}`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let values: HashMap<String, Value> = serde_json::from_str(json)?;
        Ok(Self { values })
    }

    /// Returns the context with an additional binding
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Look up `name` as a direct binding, then as a dotted path through objects
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }

        let mut parts = name.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            match current {
                Value::Object(fields) => current = fields.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Dotted path to leaf value mapping, built once per render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedPaths {
    entries: BTreeMap<String, Value>,
}

impl FlattenedPaths {
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn contains_key(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

/// Flatten `value` into dotted paths under `prefix`.
///
/// Objects are descended depth-first. Arrays and primitives are leaves. An
/// empty prefix produces keys without a leading dot.
pub fn flatten(value: &Value, prefix: &str) -> FlattenedPaths {
    let mut paths = FlattenedPaths::default();
    flatten_into(value, prefix, &mut paths.entries);
    paths
}

/// Flatten every top-level binding, each under its own name
pub fn flatten_context(context: &Context) -> FlattenedPaths {
    let mut paths = FlattenedPaths::default();
    for (name, value) in context.iter() {
        flatten_into(value, name, &mut paths.entries);
    }
    paths
}

fn flatten_into(value: &Value, path: &str, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (field, child) in fields {
                let child_path = if path.is_empty() {
                    field.clone()
                } else {
                    format!("{}.{}", path, field)
                };
                flatten_into(child, &child_path, out);
            }
        }
        leaf => {
            out.insert(path.to_string(), leaf.clone());
        }
    }
}

/// Answers whether a scanned identifier names something in the input
pub trait ContextKeys {
    fn has_key(&self, key: &str) -> bool;
}

impl ContextKeys for Context {
    fn has_key(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }
}

impl ContextKeys for FlattenedPaths {
    fn has_key(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

impl ContextKeys for HashSet<String> {
    fn has_key(&self, key: &str) -> bool {
        self.contains(key)
    }
}

impl ContextKeys for BTreeSet<String> {
    fn has_key(&self, key: &str) -> bool {
        self.contains(key)
    }
}

impl ContextKeys for [&str] {
    fn has_key(&self, key: &str) -> bool {
        self.contains(&key)
    }
}

impl<T: ContextKeys + ?Sized> ContextKeys for &T {
    fn has_key(&self, key: &str) -> bool {
        (**self).has_key(key)
    }
}
