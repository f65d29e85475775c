use std::cmp::Ordering;
use std::fmt;

use super::DataType;

/// A typed runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Varchar(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Serializes the value for the given column type. NULLs serialize to
    /// a zeroed placeholder of the type's width; the null bitmap is what
    /// records their nullness.
    pub fn serialize(&self, data_type: &DataType) -> Option<Vec<u8>> {
        match (self, data_type) {
            (Value::Null, t) => match t.fixed_size() {
                Some(n) => Some(vec![0u8; n]),
                None => Some(0u16.to_le_bytes().to_vec()),
            },
            (Value::Boolean(b), DataType::Boolean) => Some(vec![u8::from(*b)]),
            (Value::Integer(v), DataType::Integer) => Some(v.to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::BigInt(v), DataType::BigInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Varchar(s), DataType::VarChar(max_len)) => {
                if s.len() > *max_len as usize {
                    return None;
                }
                let mut out = (s.len() as u16).to_le_bytes().to_vec();
                out.extend_from_slice(s.as_bytes());
                Some(out)
            }
            _ => None,
        }
    }

    /// Deserializes a value of the given type, returning it and the bytes
    /// consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<(Value, usize)> {
        match data_type {
            DataType::Boolean => data.first().map(|&b| (Value::Boolean(b != 0), 1)),
            DataType::Integer => {
                let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
                Some((Value::Integer(i32::from_le_bytes(bytes)), 4))
            }
            DataType::BigInt => {
                let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
                Some((Value::BigInt(i64::from_le_bytes(bytes)), 8))
            }
            DataType::VarChar(_) => {
                let len_bytes: [u8; 2] = data.get(..2)?.try_into().ok()?;
                let len = u16::from_le_bytes(len_bytes) as usize;
                let raw = data.get(2..2 + len)?;
                Some((Value::Varchar(String::from_utf8_lossy(raw).into_owned()), 2 + len))
            }
        }
    }

    /// Three-way comparison; None for NULLs and incompatible types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::BigInt(b)) => Some((*a as i64).cmp(b)),
            (Value::BigInt(a), Value::Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}
