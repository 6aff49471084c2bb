use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::common::{RecordId, Result, StorageError};

use super::{Schema, Value};

/// Represents a single row of a table.
///
/// A tuple holds one value per schema column and, once it has been stored
/// in a heap page, the `RecordId` of the slot that holds it.
///
/// ## Record Format
///
/// Records are fixed-width: every column is written in schema order using
/// exactly `DataType::width()` bytes, so a record always occupies
/// `Schema::record_width()` bytes. There is no null bitmap.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Where the tuple is stored, if it has been inserted
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple, checking every value against its column type.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(StorageError::InvalidValue {
                column: "*".to_string(),
                reason: format!(
                    "expected {} values, got {}",
                    schema.column_count(),
                    values.len()
                ),
            });
        }
        for (col, value) in schema.columns().zip(values.iter()) {
            if !value.fits(col.data_type()) {
                return Err(StorageError::InvalidValue {
                    column: col.name().to_string(),
                    reason: format!("{:?} does not fit {}", value, col.data_type()),
                });
            }
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the stored location of this tuple, if it has one.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Writes the fixed-width record encoding of this tuple.
    pub fn serialize_into<B: BufMut>(&self, buf: &mut B) {
        for (col, value) in self.schema.columns().zip(self.values.iter()) {
            value.encode(col.data_type(), buf);
        }
    }

    /// Serializes the tuple into a freshly allocated record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.schema.record_width());
        self.serialize_into(&mut bytes);
        bytes
    }

    /// Decodes one record. Returns None if the bytes are not a valid record
    /// for the schema.
    pub fn deserialize<B: Buf>(schema: Arc<Schema>, buf: &mut B) -> Option<Self> {
        let mut values = Vec::with_capacity(schema.column_count());
        for col in schema.columns() {
            values.push(Value::decode(col.data_type(), buf)?);
        }
        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::DataType;

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Char(12))
            .column("score", DataType::Double)
            .build_arc()
    }

    #[test]
    fn test_tuple_rejects_wrong_arity() {
        let result = Tuple::new(schema(), vec![Value::Integer(1)]);
        assert!(matches!(result, Err(StorageError::InvalidValue { .. })));
    }

    #[test]
    fn test_tuple_rejects_wrong_type() {
        let result = Tuple::new(
            schema(),
            vec![Value::from("x"), Value::from("y"), Value::Double(1.0)],
        );
        assert!(matches!(result, Err(StorageError::InvalidValue { column, .. }) if column == "id"));
    }

    #[test]
    fn test_tuple_bytes_have_record_width() {
        let schema = schema();
        let tuple = Tuple::new(
            schema.clone(),
            vec![Value::Integer(7), Value::from("alice"), Value::Double(2.5)],
        )
        .unwrap();

        let bytes = tuple.to_bytes();
        assert_eq!(bytes.len(), schema.record_width());

        let decoded = Tuple::deserialize(schema, &mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.values(), tuple.values());
        assert_eq!(decoded.record_id(), None);
        assert_eq!(decoded.value_by_name("name"), Some(&Value::from("alice")));
    }

    #[test]
    fn test_tuple_display() {
        let tuple = Tuple::new(
            schema(),
            vec![Value::Integer(1), Value::from("bob"), Value::Double(0.5)],
        )
        .unwrap();
        assert_eq!(tuple.to_string(), "(1, bob, 0.5)");
    }
}
