//! Callback arguments.
//!
//! Events carry an ordered list of [`Value`]s. Callbacks declare the
//! [`Signature`] they accept when they are registered; resolution compares
//! the two (see [`crate::dispatch`]).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An argument passed to a scheduled callback.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Anything else. Callbacks downcast it themselves.
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// The runtime kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Bytes,
    Opaque,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// Wraps an arbitrary value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("Unit"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::UInt(v) => write!(f, "UInt({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Text(v) => write!(f, "Text({v:?})"),
            Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Value::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// The argument shape a callback accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    /// Arguments must match these kinds one for one.
    Exact(Vec<ValueKind>),
    /// Any arguments of this arity, whatever their kinds.
    Loose(usize),
}

impl Signature {
    /// A callback taking no arguments.
    pub fn none() -> Self {
        Signature::Exact(Vec::new())
    }

    pub fn exact(kinds: impl Into<Vec<ValueKind>>) -> Self {
        Signature::Exact(kinds.into())
    }

    pub fn loose(arity: usize) -> Self {
        Signature::Loose(arity)
    }

    pub fn matches_exactly(&self, args: &[Value]) -> bool {
        match self {
            Signature::Exact(kinds) => {
                kinds.len() == args.len()
                    && kinds.iter().zip(args).all(|(kind, arg)| *kind == arg.kind())
            }
            Signature::Loose(_) => false,
        }
    }

    pub fn matches_loosely(&self, args: &[Value]) -> bool {
        match self {
            Signature::Loose(arity) => *arity == args.len(),
            Signature::Exact(_) => false,
        }
    }
}

/// Renders argument kinds for error messages, e.g. `[Int, Text]`.
pub(crate) fn describe_kinds(args: &[Value]) -> String {
    let kinds: Vec<_> = args.iter().map(Value::kind).collect();
    format!("{kinds:?}")
}
