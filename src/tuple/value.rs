use std::fmt;

use bytes::{Buf, BufMut};

use super::data_type::CHAR_LENGTH_PREFIX;
use super::DataType;

/// A typed value stored in one column of a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    String(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of the given type.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Integer(_), DataType::Integer)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Double(_), DataType::Double) => true,
            (Value::String(s), DataType::Char(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Writes the value as exactly `data_type.width()` bytes.
    /// The caller must have checked `fits` first.
    pub(crate) fn encode<B: BufMut>(&self, data_type: &DataType, buf: &mut B) {
        match (self, data_type) {
            (Value::Boolean(b), _) => buf.put_u8(u8::from(*b)),
            (Value::Integer(v), _) => buf.put_i32(*v),
            (Value::BigInt(v), _) => buf.put_i64(*v),
            (Value::Double(v), _) => buf.put_f64(*v),
            (Value::String(s), DataType::Char(n)) => {
                let bytes = s.as_bytes();
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(bytes);
                buf.put_bytes(0, *n as usize - bytes.len());
            }
            (Value::String(_), other) => buf.put_bytes(0, other.width()),
        }
    }

    /// Reads a value of the given type, consuming exactly `data_type.width()` bytes.
    /// Returns None if the bytes are not a valid encoding.
    pub(crate) fn decode<B: Buf>(data_type: &DataType, buf: &mut B) -> Option<Self> {
        if buf.remaining() < data_type.width() {
            return None;
        }
        match data_type {
            DataType::Boolean => Some(Value::Boolean(buf.get_u8() != 0)),
            DataType::Integer => Some(Value::Integer(buf.get_i32())),
            DataType::BigInt => Some(Value::BigInt(buf.get_i64())),
            DataType::Double => Some(Value::Double(buf.get_f64())),
            DataType::Char(n) => {
                let n = *n as usize;
                let len = buf.get_u32() as usize;
                if len > n {
                    return None;
                }
                let mut payload = vec![0u8; n];
                buf.copy_to_slice(&mut payload);
                payload.truncate(len);
                String::from_utf8(payload).ok().map(Value::String)
            }
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
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

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits() {
        assert!(Value::Integer(1).fits(&DataType::Integer));
        assert!(!Value::Integer(1).fits(&DataType::BigInt));
        assert!(Value::from("abc").fits(&DataType::Char(3)));
        assert!(!Value::from("abcd").fits(&DataType::Char(3)));
    }

    #[test]
    fn test_char_is_padded_to_width() {
        let mut buf = Vec::new();
        Value::from("hi").encode(&DataType::Char(8), &mut buf);
        assert_eq!(buf.len(), DataType::Char(8).width());
        assert_eq!(&buf[..4], &2u32.to_be_bytes());
        assert_eq!(&buf[4..6], b"hi");
        assert!(buf[6..].iter().all(|&b| b == 0));

        let decoded = Value::decode(&DataType::Char(8), &mut buf.as_slice()).unwrap();
        assert_eq!(decoded, Value::from("hi"));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&9u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        assert!(Value::decode(&DataType::Char(8), &mut buf.as_slice()).is_none());
    }

    #[test]
    fn test_decode_short_buffer() {
        let buf = [0u8; 2];
        assert!(Value::decode(&DataType::Integer, &mut &buf[..]).is_none());
    }
}
