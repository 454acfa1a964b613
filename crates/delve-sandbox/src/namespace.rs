//! The persistent binding store owned by a [`crate::Sandbox`].

use std::collections::BTreeMap;

use crate::value::Value;

/// An ordered name → value mapping.
pub type Bindings = BTreeMap<String, Value>;

/// Explicit namespace object holding every binding visible to snippets.
///
/// Names starting with `__` are environment internals: they are readable
/// like any other binding but never reported by [`Namespace::diff`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    bindings: Bindings,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.bindings.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    /// A deep copy of every binding, internals included.
    pub fn snapshot(&self) -> Bindings {
        self.bindings.clone()
    }

    /// Entries that are new or structurally different from `before`.
    ///
    /// Comparison is by full value, so a list appended to in place counts
    /// as changed even though its name still refers to the "same" list.
    pub fn diff(&self, before: &Bindings) -> Bindings {
        self.bindings
            .iter()
            .filter(|(name, _)| !is_internal(name))
            .filter(|(name, value)| before.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

pub fn is_internal(name: &str) -> bool {
    name.starts_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_reports_new_and_changed() {
        let mut ns = Namespace::new();
        ns.insert("a", Value::Int(1));
        ns.insert("b", Value::Int(2));
        let before = ns.snapshot();

        ns.insert("b", Value::Int(3));
        ns.insert("c", Value::str("x"));

        let changed = ns.diff(&before);
        assert_eq!(changed.len(), 2);
        assert_eq!(changed["b"], Value::Int(3));
        assert_eq!(changed["c"], Value::str("x"));
    }

    #[test]
    fn diff_detects_in_place_mutation() {
        let mut ns = Namespace::new();
        ns.insert("xs", Value::List(vec![Value::Int(1)]));
        let before = ns.snapshot();

        if let Some(Value::List(items)) = ns.get_mut("xs") {
            items.push(Value::Int(2));
        }

        assert!(ns.diff(&before).contains_key("xs"));
    }

    #[test]
    fn diff_skips_internals() {
        let mut ns = Namespace::new();
        let before = ns.snapshot();
        ns.insert("__host", Value::None);
        assert!(ns.diff(&before).is_empty());
    }

    #[test]
    fn int_to_float_rebind_is_a_change() {
        let mut ns = Namespace::new();
        ns.insert("n", Value::Int(1));
        let before = ns.snapshot();
        ns.insert("n", Value::Float(1.0));
        assert!(ns.diff(&before).contains_key("n"));
    }
}
