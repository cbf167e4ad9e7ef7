use std::io;
use std::io::{Read, Write};

use bytes::BytesMut;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::codec::{decode_record, encode_record};
use crate::schema::SchemaRef;
use crate::zone::{ZoneCode, ZoneCodeError};

/// The counter value used by uninitialized records.
pub const UNINITIALIZED_COUNTER: i32 = i32::MIN;
/// The record identifier used by uninitialized records.
pub const UNINITIALIZED_RECORD_ID: i64 = i64::MIN;

#[derive(Debug, thiserror::Error)]
/// An error that can occur when building or combining [CensusRecord]s.
pub enum RecordError {
    #[error("Expected {expected} counters but found {found}")]
    /// The line or counter list does not match the table schema.
    FieldCount { expected: usize, found: usize },
    #[error("Field {field:?} has invalid counter value {value:?}")]
    /// A counter could not be parsed as an integer.
    InvalidCounter { field: String, value: String },
    #[error("Invalid zone code: {0}")]
    /// The zone code could not be extracted or padded.
    ZoneCode(#[from] ZoneCodeError),
    #[error("Cannot combine a {left} record with a {right} record")]
    /// Only records of the same table can be aggregated.
    SchemaMismatch { left: String, right: String },
    #[error("Counter {field:?} overflowed during aggregation")]
    /// The sum of the two counters does not fit in an `i32`.
    CounterOverflow { field: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
/// A single row of a census table.
///
/// Records are immutable once built, aggregation produces a new record
/// rather than modifying either operand.
pub struct CensusRecord {
    schema: SchemaRef,
    record_id: i64,
    zone_code: ZoneCode,
    counters: Box<[i32]>,
}

impl CensusRecord {
    /// Creates a record with sentinel values marking it as not yet populated.
    pub fn uninitialized(schema: SchemaRef) -> Self {
        let counters = vec![UNINITIALIZED_COUNTER; schema.field_count()].into_boxed_slice();
        Self {
            schema,
            record_id: UNINITIALIZED_RECORD_ID,
            zone_code: ZoneCode::blank(),
            counters,
        }
    }

    /// Creates a record where every counter is `0`.
    ///
    /// This is the identity of [CensusRecord::aggregate].
    pub fn zeroed(schema: SchemaRef, record_id: i64, zone_code: ZoneCode) -> Self {
        let counters = vec![0; schema.field_count()].into_boxed_slice();
        Self {
            schema,
            record_id,
            zone_code,
            counters,
        }
    }

    /// Creates a record from counters given in schema order.
    pub fn from_counters(
        schema: SchemaRef,
        record_id: i64,
        zone_code: ZoneCode,
        counters: Vec<i32>,
    ) -> Result<Self, RecordError> {
        if counters.len() != schema.field_count() {
            return Err(RecordError::FieldCount {
                expected: schema.field_count(),
                found: counters.len(),
            });
        }

        Ok(Self::from_parts(
            schema,
            record_id,
            zone_code,
            counters.into_boxed_slice(),
        ))
    }

    pub(crate) fn from_parts(
        schema: SchemaRef,
        record_id: i64,
        zone_code: ZoneCode,
        counters: Box<[i32]>,
    ) -> Self {
        debug_assert_eq!(counters.len(), schema.field_count());
        Self {
            schema,
            record_id,
            zone_code,
            counters,
        }
    }

    /// Parses a single comma separated source line.
    ///
    /// The first column holds the (usually quoted) zone code, the remaining
    /// columns hold the counters in schema order.
    pub fn parse_line(schema: SchemaRef, record_id: i64, line: &str) -> Result<Self, RecordError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut columns = line.split(',');

        let zone_column = columns.next().unwrap_or_default();
        let zone_code = ZoneCode::from_source_field(zone_column)?;

        let values: Vec<&str> = columns.collect();
        if values.len() != schema.field_count() {
            return Err(RecordError::FieldCount {
                expected: schema.field_count(),
                found: values.len(),
            });
        }

        let mut counters = Vec::with_capacity(values.len());
        for (field, value) in schema.fields().zip(values) {
            let counter = value.trim().parse::<i32>().map_err(|_| {
                RecordError::InvalidCounter {
                    field: field.to_string(),
                    value: value.to_string(),
                }
            })?;
            counters.push(counter);
        }

        Ok(Self::from_parts(
            schema,
            record_id,
            zone_code,
            counters.into_boxed_slice(),
        ))
    }

    /// Reads exactly one record from the reader.
    ///
    /// If the reader is exhausted before a full record is read an
    /// [io::ErrorKind::UnexpectedEof] error is returned.
    pub fn read_binary<R: Read>(schema: SchemaRef, reader: &mut R) -> io::Result<Self> {
        let mut buffer = vec![0u8; schema.record_length() as usize];
        reader.read_exact(&mut buffer)?;
        decode_record(&schema, &mut buffer.as_slice())
    }

    /// Writes the binary form of the record to the writer.
    ///
    /// This writes exactly [CensusRecord::size_in_bytes] bytes.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Returns the binary form of the record.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(self.size_in_bytes() as usize);
        encode_record(self, &mut buffer);
        buffer
    }

    #[inline]
    /// The table the record belongs to.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[inline]
    /// The position of the record within its store.
    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    #[inline]
    /// The padded zone code of the record.
    pub fn zone_code(&self) -> ZoneCode {
        self.zone_code
    }

    #[inline]
    /// The counters in schema order.
    pub fn counters(&self) -> &[i32] {
        &self.counters
    }

    /// Returns the value of the named counter.
    pub fn get(&self, field: &str) -> Option<i32> {
        let position = self.schema.position(field)?;
        self.counters.get(position).copied()
    }

    /// Returns if every counter still holds the uninitialized sentinel.
    pub fn is_uninitialized(&self) -> bool {
        self.record_id == UNINITIALIZED_RECORD_ID
            && self.counters.iter().all(|c| *c == UNINITIALIZED_COUNTER)
    }

    #[inline]
    /// The number of bytes the record takes up on disk.
    pub fn size_in_bytes(&self) -> u64 {
        self.schema.record_length()
    }

    /// The CSV header for records of this table.
    pub fn csv_header(&self) -> String {
        self.schema.csv_header()
    }

    /// Renders the record as a CSV line matching [CensusRecord::csv_header].
    pub fn to_csv_values(&self) -> String {
        let mut line = format!("{},{}", self.record_id, self.zone_code);
        line.reserve(self.counters.len() * 6);
        for counter in self.counters.iter() {
            line.push(',');
            line.push_str(&counter.to_string());
        }
        line
    }

    /// Sums the counters of both records.
    ///
    /// The result takes the identifier and zone code of `other`.
    pub fn aggregate(&self, other: &CensusRecord) -> Result<CensusRecord, RecordError> {
        let counters = self.sum_counters(other)?;
        Ok(Self::from_parts(
            other.schema.clone(),
            other.record_id,
            other.zone_code,
            counters,
        ))
    }

    /// Sums the counters of both records, giving the result the provided
    /// identifier and zone code.
    ///
    /// The zone code is right padded with spaces.
    pub fn aggregate_as(
        &self,
        other: &CensusRecord,
        record_id: i64,
        zone_code: &str,
    ) -> Result<CensusRecord, RecordError> {
        let zone_code = ZoneCode::new(zone_code)?;
        let counters = self.sum_counters(other)?;
        Ok(Self::from_parts(
            other.schema.clone(),
            record_id,
            zone_code,
            counters,
        ))
    }

    fn sum_counters(&self, other: &CensusRecord) -> Result<Box<[i32]>, RecordError> {
        if self.schema != other.schema {
            return Err(RecordError::SchemaMismatch {
                left: self.schema.name().to_string(),
                right: other.schema.name().to_string(),
            });
        }

        self.counters
            .iter()
            .zip(other.counters.iter())
            .enumerate()
            .map(|(position, (left, right))| {
                left.checked_add(*right).ok_or_else(|| RecordError::CounterOverflow {
                    field: self
                        .schema
                        .field_name(position)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect()
    }
}

impl Serialize for CensusRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CensusRecord", 4)?;
        state.serialize_field("table", self.schema.name())?;
        state.serialize_field("record_id", &self.record_id)?;
        state.serialize_field("zone_code", &self.zone_code)?;
        state.serialize_field("counters", &NamedCounters(self))?;
        state.end()
    }
}

struct NamedCounters<'a>(&'a CensusRecord);

impl Serialize for NamedCounters<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.0;
        let mut map = serializer.serialize_map(Some(record.counters.len()))?;
        for (field, counter) in record.schema.fields().zip(record.counters.iter()) {
            map.serialize_entry(field, counter)?;
        }
        map.end()
    }
}
