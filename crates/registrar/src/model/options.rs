use serde_json::Value;

use super::Attributes;

/// Per-call options for construction and mutation.
///
/// `extra` holds caller-defined keys; they are forwarded untouched to the
/// `initialize`/`parse`/`validate` hooks and to emitted change events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Run the class `parse` hook over the raw attributes at construction.
    pub parse: bool,
    /// Update change bookkeeping without notifying listeners.
    pub silent: bool,
    pub extra: Attributes,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn with_parse(mut self) -> Self {
        self.parse = true;
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
