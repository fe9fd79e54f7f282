//! Node options.

use indexmap::IndexMap;
use serde_json::Value;

use super::SourceReference;

/// User supplied configuration attached to a node.
///
/// Options are opaque to the engine apart from `reference`, which, when set,
/// is reused as the identity of the constructed node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    reference: Option<SourceReference>,
    values: IndexMap<String, Value>,
}

impl Options {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying only an explicit reference.
    pub fn with_reference(reference: impl Into<SourceReference>) -> Self {
        Self {
            reference: Some(reference.into()),
            values: IndexMap::new(),
        }
    }

    /// Set a value, returning the updated options.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set the explicit reference, returning the updated options.
    pub fn reference(mut self, reference: impl Into<SourceReference>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The explicit reference, if one was supplied.
    pub fn explicit_reference(&self) -> Option<&SourceReference> {
        self.reference.as_ref()
    }

    /// These options without the explicit reference.
    pub fn without_reference(&self) -> Options {
        Options {
            reference: None,
            values: self.values.clone(),
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All values in insertion order.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Whether there is neither a reference nor any value.
    pub fn is_empty(&self) -> bool {
        self.reference.is_none() && self.values.is_empty()
    }

    /// Shallow merge: every key in `overlay` replaces the key in `self`.
    pub fn merge(&self, overlay: &Options) -> Options {
        let mut values = self.values.clone();
        for (key, value) in &overlay.values {
            values.insert(key.clone(), value.clone());
        }
        Options {
            reference: overlay.reference.clone().or_else(|| self.reference.clone()),
            values,
        }
    }
}

impl From<IndexMap<String, Value>> for Options {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self {
            reference: None,
            values,
        }
    }
}
