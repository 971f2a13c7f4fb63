//! Field value types
//!
//! A field holds either a single [`Value`] or an ordered vector of them
//! ([`FieldValue`]). Values are strongly typed; the schema decides which
//! variant a given field accepts.
//!
//! ## Equality Rules
//!
//! - Different variants are NEVER equal (no coercion)
//! - `Date` values compare at millisecond precision, the precision they
//!   are persisted with
//! - `Ip` values compare byte-for-byte; IPv4 addresses are 4 bytes and
//!   IPv6 addresses 16 bytes

use crate::schema::FieldType;
use crate::types::Invid;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Longest string value, in modified UTF-8 bytes
pub const MAX_STRING_BYTES: usize = u16::MAX as usize;

/// Longest IP address value, in octets
pub const MAX_IP_OCTETS: usize = u8::MAX as usize;

/// Most elements a vector field can hold
pub const MAX_VECTOR_LEN: usize = i16::MAX as usize;

/// Length of `s` once encoded as modified UTF-8
///
/// NUL takes two bytes and characters outside the BMP take six (a
/// surrogate pair of three bytes each).
pub fn modified_utf8_len(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0 => 2,
            0x01..=0x7F => 1,
            0x80..=0x7FF => 2,
            0x800..=0xFFFF => 3,
            _ => 6,
        })
        .sum()
}

/// A scalar field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// Point in time, millisecond precision
    Date(DateTime<Utc>),

    /// Text
    String(String),

    /// Reference to another object
    Invid(Invid),

    /// IP address as raw octets
    Ip(Vec<u8>),
}

impl Value {
    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Date(_) => "Date",
            Value::String(_) => "String",
            Value::Invid(_) => "Invid",
            Value::Ip(_) => "Ip",
        }
    }

    /// The schema field type that stores this kind of value
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Boolean,
            Value::Int(_) => FieldType::Numeric,
            Value::Date(_) => FieldType::Date,
            Value::String(_) => FieldType::String,
            Value::Invid(_) => FieldType::Invid,
            Value::Ip(_) => FieldType::IpAddr,
        }
    }

    /// Build a date value from milliseconds since the Unix epoch
    ///
    /// Returns `None` when the instant is out of chrono's range.
    pub fn date_from_millis(millis: i64) -> Option<Value> {
        Utc.timestamp_millis_opt(millis).single().map(Value::Date)
    }

    /// Build a date value truncated to millisecond precision
    pub fn date(at: DateTime<Utc>) -> Value {
        Value::date_from_millis(at.timestamp_millis()).unwrap_or(Value::Date(at))
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as a date
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an object reference
    pub fn as_invid(&self) -> Option<Invid> {
        match self {
            Value::Invid(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as IP octets
    pub fn as_ip(&self) -> Option<&[u8]> {
        match self {
            Value::Ip(b) => Some(b),
            _ => None,
        }
    }

    /// The on-disk limit this value exceeds, as `(what, len, max)`
    pub fn oversize(&self) -> Option<(&'static str, usize, usize)> {
        match self {
            Value::String(s) => {
                let len = modified_utf8_len(s);
                (len > MAX_STRING_BYTES).then_some(("string bytes", len, MAX_STRING_BYTES))
            }
            Value::Ip(octets) => (octets.len() > MAX_IP_OCTETS)
                .then_some(("address octets", octets.len(), MAX_IP_OCTETS)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::String(s) => write!(f, "{}", s),
            Value::Invid(i) => write!(f, "{}", i),
            Value::Ip(octets) if octets.len() == 4 => write!(
                f,
                "{}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            ),
            Value::Ip(octets) => {
                let groups: Vec<String> = octets
                    .chunks(2)
                    .map(|pair| match pair {
                        [hi, lo] => format!("{:x}", u16::from_be_bytes([*hi, *lo])),
                        [single] => format!("{:x}", single),
                        _ => String::new(),
                    })
                    .collect();
                write!(f, "{}", groups.join(":"))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Invid> for Value {
    fn from(i: Invid) -> Self {
        Value::Invid(i)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::date(d)
    }
}

/// The contents of one field in an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A single value
    Scalar(Value),

    /// An ordered list of values, all of the field's type
    Vector(Vec<Value>),
}

impl FieldValue {
    /// Whether the field carries any data
    ///
    /// Scalars are always defined; vectors are defined when non-empty.
    pub fn is_defined(&self) -> bool {
        match self {
            FieldValue::Scalar(_) => true,
            FieldValue::Vector(values) => !values.is_empty(),
        }
    }

    /// Whether this is a vector field value
    pub fn is_vector(&self) -> bool {
        matches!(self, FieldValue::Vector(_))
    }

    /// The scalar value, if this is a scalar
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Vector(_) => None,
        }
    }

    /// The vector elements, if this is a vector
    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            FieldValue::Scalar(_) => None,
            FieldValue::Vector(values) => Some(values),
        }
    }

    /// Iterate over every value held, scalar or vector
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        let slice: &[Value] = match self {
            FieldValue::Scalar(v) => std::slice::from_ref(v),
            FieldValue::Vector(values) => values,
        };
        slice.iter()
    }
}
