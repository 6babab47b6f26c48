use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Attribute mapping of a model: attribute name to current value.
pub type Attributes = Map<String, Value>;

/// Per-round change record. `None` marks an attribute that was unset.
pub type ChangeSet = IndexMap<String, Option<Value>>;

/// Interprets a raw JSON value as an attribute mapping.
///
/// Objects are taken as-is; anything else (including `null`) yields an
/// empty mapping.
pub fn attributes_from(raw: Value) -> Attributes {
    match raw {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Normalised mutation input: ordered `(key, value)` entries where a `None`
/// value removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    entries: Vec<(String, Option<Value>)>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `key`.
    pub fn assign(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.push((key.into(), Some(value)));
        self
    }

    /// Removes `key`.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.entries.push((key.into(), None));
        self
    }

    pub(crate) fn remove_all<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            entries: keys.into_iter().map(|k| (k, None)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// The attribute mapping `base` would become once this delta applied.
    pub fn applied_to(&self, base: &Attributes) -> Attributes {
        let mut next = base.clone();
        for (key, value) in &self.entries {
            match value {
                Some(v) => {
                    next.insert(key.clone(), v.clone());
                }
                None => {
                    next.remove(key);
                }
            }
        }
        next
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Option<Value>)> {
        self.entries
    }
}

impl From<Attributes> for Delta {
    fn from(attrs: Attributes) -> Self {
        Self {
            entries: attrs.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }
}

impl From<Value> for Delta {
    fn from(raw: Value) -> Self {
        attributes_from(raw).into()
    }
}

impl<K: Into<String>> From<(K, Value)> for Delta {
    fn from((key, value): (K, Value)) -> Self {
        Self::new().assign(key, value)
    }
}
