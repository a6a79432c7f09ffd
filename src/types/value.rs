//! Values flowing in and out of the codec.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decoded (or to-be-encoded) signals of one frame, keyed by signal name.
pub type SignalMap = BTreeMap<String, SignalValue>;

/// A value-table entry: a label carrying the raw integer it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedValue {
    pub value: i64,
    pub name: String,
}

impl NamedValue {
    pub fn new(value: i64, name: impl Into<String>) -> Self {
        NamedValue {
            value,
            name: name.into(),
        }
    }
}

impl fmt::Display for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq<str> for NamedValue {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq<&str> for NamedValue {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

/// A signal value: integer, float, or a label from the signal's value table.
///
/// Integers are `i128` so that both the full unsigned and the full signed
/// 64-bit raw ranges are representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    Int(i128),
    Float(f64),
    Named(NamedValue),
}

impl SignalValue {
    /// Numeric view of the value. Labels yield their raw number.
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Int(v) => *v as f64,
            SignalValue::Float(v) => *v,
            SignalValue::Named(n) => n.value as f64,
        }
    }

    /// Integer view, `None` for floats with a fractional part.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            SignalValue::Int(v) => Some(*v),
            SignalValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i128),
            SignalValue::Float(_) => None,
            SignalValue::Named(n) => Some(n.value as i128),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, SignalValue::Named(_))
    }

    pub fn as_named(&self) -> Option<&NamedValue> {
        match self {
            SignalValue::Named(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Int(v) => write!(f, "{v}"),
            SignalValue::Float(v) => write!(f, "{v}"),
            SignalValue::Named(n) => write!(f, "{n}"),
        }
    }
}

impl PartialEq<str> for SignalValue {
    fn eq(&self, other: &str) -> bool {
        matches!(self, SignalValue::Named(n) if n.name == other)
    }
}

impl PartialEq<&str> for SignalValue {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for SignalValue {
            fn from(v: $t) -> Self {
                SignalValue::Int(v as i128)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<f32> for SignalValue {
    fn from(v: f32) -> Self {
        SignalValue::Float(v as f64)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<NamedValue> for SignalValue {
    fn from(v: NamedValue) -> Self {
        SignalValue::Named(v)
    }
}

/// A bare label; its raw number is resolved against the signal's value table.
impl From<&str> for SignalValue {
    fn from(label: &str) -> Self {
        SignalValue::Named(NamedValue::new(0, label))
    }
}
