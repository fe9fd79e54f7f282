//! Node References
//!
//! This module defines the identities carried by nodes and scalar sources.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ids below this value are reserved for well-known symbols.
const FIRST_MINTED_ID: u64 = 16;

/// A process-unique opaque identity.
///
/// Two symbols are equal only when they were produced by the same call to
/// [`Symbol::new`] (or are the same well-known symbol). The description is
/// informational and never takes part in comparisons.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    /// The reserved symbol marking a fragment node.
    pub const FRAGMENT: Symbol = Symbol {
        id: 0,
        description: None,
    };

    /// The reserved symbol marking a token node.
    pub const TOKEN: Symbol = Symbol {
        id: 1,
        description: None,
    };

    /// Mint a new unique symbol with a description.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: next_symbol_id(),
            description: Some(description.into()),
        }
    }

    /// Mint a new unique symbol without a description.
    pub fn unique() -> Self {
        Self {
            id: next_symbol_id(),
            description: None,
        }
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.id
    }

    /// The description given when the symbol was minted.
    pub fn description(&self) -> Option<&str> {
        match self.id {
            0 => Some("Fragment"),
            1 => Some("Token"),
            _ => self.description.as_deref(),
        }
    }

    /// Whether this is one of the reserved well-known symbols.
    pub fn is_well_known(&self) -> bool {
        self.id < FIRST_MINTED_ID
    }
}

fn next_symbol_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(FIRST_MINTED_ID);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "Symbol({description})#{}", self.id),
            None => write!(f, "Symbol#{}", self.id),
        }
    }
}

/// A scalar identity: either a marshallable primitive or a [`Symbol`].
///
/// Scalars double as leaf sources: a node built from a `SourceReference`
/// carries it as its source.
#[derive(Clone, Debug)]
pub enum SourceReference {
    /// A string value.
    String(Arc<str>),
    /// A numeric value. Compared by value, with `-0.0 == 0.0`.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// An opaque unique identity.
    Symbol(Symbol),
}

/// The reference carried by every fragment node.
pub const FRAGMENT: SourceReference = SourceReference::Symbol(Symbol::FRAGMENT);

/// The reference carried by every token node.
pub const TOKEN: SourceReference = SourceReference::Symbol(Symbol::TOKEN);

impl SourceReference {
    /// Mint a fresh process-unique reference.
    pub fn unique(description: &str) -> Self {
        Self::Symbol(Symbol::new(description))
    }

    /// Whether this is the fragment reference.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Self::Symbol(symbol) if *symbol == Symbol::FRAGMENT)
    }

    /// Whether the reference survives transmission (not a symbol).
    pub fn is_marshallable(&self) -> bool {
        !matches!(self, Self::Symbol(_))
    }

    /// Borrow the string value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for SourceReference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => number_bits(*a) == number_bits(*b),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SourceReference {}

impl Hash for SourceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::String(value) => value.hash(state),
            Self::Number(value) => number_bits(*value).hash(state),
            Self::Boolean(value) => value.hash(state),
            Self::Symbol(value) => value.hash(state),
        }
    }
}

fn number_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value:?}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Symbol(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<&str> for SourceReference {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for SourceReference {
    fn from(value: String) -> Self {
        Self::String(value.into())
    }
}

impl From<f64> for SourceReference {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for SourceReference {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for SourceReference {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for SourceReference {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Symbol> for SourceReference {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

/// A reference that can be transmitted or stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarshalledReference {
    /// Boolean reference.
    Boolean(bool),
    /// Whole numbered reference, as assigned while marshalling. Listed
    /// ahead of [`MarshalledReference::Number`] so integral input decodes
    /// here.
    Integer(u64),
    /// Numeric reference.
    Number(f64),
    /// String reference.
    String(String),
}

impl From<MarshalledReference> for SourceReference {
    fn from(value: MarshalledReference) -> Self {
        match value {
            MarshalledReference::Boolean(value) => Self::Boolean(value),
            MarshalledReference::Integer(value) => Self::Number(value as f64),
            MarshalledReference::Number(value) => Self::Number(value),
            MarshalledReference::String(value) => Self::String(value.into()),
        }
    }
}

impl TryFrom<&SourceReference> for MarshalledReference {
    type Error = Symbol;

    fn try_from(value: &SourceReference) -> Result<Self, Self::Error> {
        match value {
            SourceReference::String(value) => Ok(Self::String(value.to_string())),
            SourceReference::Number(value) => Ok(Self::Number(*value)),
            SourceReference::Boolean(value) => Ok(Self::Boolean(*value)),
            SourceReference::Symbol(symbol) => Err(symbol.clone()),
        }
    }
}

impl From<u64> for MarshalledReference {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::new("a");
        let b = Symbol::new("a");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(!a.is_well_known());
    }

    #[test]
    fn fragment_is_well_known() {
        assert!(FRAGMENT.is_fragment());
        assert!(!TOKEN.is_fragment());
        assert_eq!(Symbol::FRAGMENT.description(), Some("Fragment"));
        assert!(Symbol::FRAGMENT.is_well_known());
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(SourceReference::from(0.0), SourceReference::from(-0.0));
        assert_eq!(SourceReference::from(1), SourceReference::from(1.0));
        assert_ne!(SourceReference::from(1), SourceReference::from("1"));
    }

    #[test]
    fn symbols_do_not_marshal() {
        let symbol = SourceReference::unique("element");
        assert!(!symbol.is_marshallable());
        assert!(MarshalledReference::try_from(&symbol).is_err());

        let text = SourceReference::from("div");
        assert_eq!(
            MarshalledReference::try_from(&text).ok(),
            Some(MarshalledReference::String("div".into()))
        );
    }

    #[test]
    fn whole_numbers_marshal_as_integers() {
        let counter = MarshalledReference::from(3_u64);
        assert_eq!(serde_json::to_string(&counter).unwrap(), "3");
        assert_eq!(SourceReference::from(counter), SourceReference::from(3));

        let decoded: MarshalledReference = serde_json::from_str("7").unwrap();
        assert_eq!(decoded, MarshalledReference::Integer(7));
        let fractional: MarshalledReference = serde_json::from_str("1.5").unwrap();
        assert_eq!(fractional, MarshalledReference::Number(1.5));
    }
}
