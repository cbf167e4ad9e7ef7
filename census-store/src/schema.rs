use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::zone::ZONE_CODE_LEN;

/// Bytes used by the record identifier (`i64`).
pub const RECORD_ID_WIDTH: u64 = 8;
/// Bytes used by a single zone code character (UTF-16 code unit).
pub const ZONE_CHAR_WIDTH: u64 = 2;
/// Bytes used by a single counter (`i32`).
pub const COUNTER_WIDTH: u64 = 4;

/// The CSV column names used for the identifier and zone code,
/// these always precede the table fields.
pub const RECORD_ID_COLUMN: &str = "record_id";
pub const ZONE_CODE_COLUMN: &str = "zone_code";

/// A schema that can be cheaply cloned and shared
/// between records by being wrapped in an [Arc].
pub type SchemaRef = Arc<TableSchema>;

#[derive(Debug, thiserror::Error)]
/// An error that can occur when defining a [TableSchema].
pub enum SchemaError {
    #[error("Schema {0:?} has no fields")]
    /// A table must count at least one thing.
    Empty(String),
    #[error("Schema {table:?} declares field {field:?} more than once")]
    /// Field names must be unique within a table.
    DuplicateField { table: String, field: String },
    #[error("Schema {table:?} field {field:?} is not a valid column name")]
    /// The field name is blank or contains a `,`, which would
    /// break the CSV header.
    InvalidField { table: String, field: String },
}

#[derive(Clone, Eq, PartialEq, Hash)]
/// The ordered set of counters making up one census table.
///
/// The order of the fields is the order of both the CSV columns and the
/// binary layout. Changing it invalidates every existing store of the table.
pub struct TableSchema {
    name: Box<str>,
    fields: Box<[Box<str>]>,
}

impl TableSchema {
    /// Creates a new schema with the given table name and ordered field names.
    pub fn new<I, S>(name: &str, fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<Box<str>> = fields
            .into_iter()
            .map(|field| field.into().into_boxed_str())
            .collect();

        if fields.is_empty() {
            return Err(SchemaError::Empty(name.to_string()));
        }

        let mut seen = ahash::HashSet::default();
        for field in fields.iter() {
            if field.trim().is_empty() || field.contains(',') {
                return Err(SchemaError::InvalidField {
                    table: name.to_string(),
                    field: field.to_string(),
                });
            }

            if !seen.insert(&**field) {
                return Err(SchemaError::DuplicateField {
                    table: name.to_string(),
                    field: field.to_string(),
                });
            }
        }

        Ok(Self {
            name: name.into(),
            fields: fields.into_boxed_slice(),
        })
    }

    /// Wraps the schema in a [SchemaRef].
    pub fn into_ref(self) -> SchemaRef {
        Arc::new(self)
    }

    #[inline]
    /// Returns the table name, e.g. `CAS001`.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    /// Returns the field names in schema order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.fields.iter().map(|field| &**field)
    }

    #[inline]
    /// Returns the number of counters in the table.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the schema position of the given field if it exists.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|name| &**name == field)
    }

    /// Returns the name of the field at the given position.
    pub fn field_name(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(|field| &**field)
    }

    /// The number of bytes a single serialized record of this table takes up.
    ///
    /// This is the stride of the binary store, record `n` lives at
    /// `n * record_length()`.
    pub fn record_length(&self) -> u64 {
        RECORD_ID_WIDTH
            + ZONE_CHAR_WIDTH * ZONE_CODE_LEN as u64
            + COUNTER_WIDTH * self.fields.len() as u64
    }

    /// Renders the CSV header line for records of this table.
    pub fn csv_header(&self) -> String {
        let mut header = String::with_capacity(32 + self.fields.len() * 24);
        header.push_str(RECORD_ID_COLUMN);
        header.push(',');
        header.push_str(ZONE_CODE_COLUMN);
        for field in self.fields.iter() {
            header.push(',');
            header.push_str(field);
        }
        header
    }
}

impl Debug for TableSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TableSchema(name={}, fields={})", self.name, self.fields.len())
    }
}
