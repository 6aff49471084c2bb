use std::fmt;

/// Represents the data types a column may hold.
/// Every type has a fixed on-page width so that records are fixed-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type: 1 byte (0 = false, 1 = true)
    Boolean,

    /// 32-bit signed integer: 4 bytes, big-endian
    Integer,

    /// 64-bit signed integer: 8 bytes, big-endian
    BigInt,

    /// 64-bit floating point: 8 bytes, IEEE 754
    Double,

    /// Character string of at most n bytes.
    /// Stored as: length (4 bytes) + data, zero-padded to n bytes
    Char(u16),
}

/// Size of the length prefix stored in front of `Char` payloads
pub const CHAR_LENGTH_PREFIX: usize = 4;

impl DataType {
    /// Returns the number of bytes a value of this type occupies in a record.
    pub fn width(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Integer => 4,
            DataType::BigInt => 8,
            DataType::Double => 8,
            DataType::Char(n) => CHAR_LENGTH_PREFIX + *n as usize,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}
