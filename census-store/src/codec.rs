//! The fixed-width binary encoding of a [CensusRecord].
//!
//! Every record of a table takes up exactly [TableSchema::record_length]
//! bytes, laid out as:
//!
//! ```text
//! +-----------+------------------------+----------------------------+
//! | record id | zone code              | counters                   |
//! | i64 (BE)  | 10 x UTF-16 unit (BE)  | field_count x i32 (BE)     |
//! +-----------+------------------------+----------------------------+
//! ```
//!
//! There is no header, delimiter or length prefix. The position of the
//! record within the store is its identifier.
//!
//! [TableSchema::record_length]: crate::TableSchema::record_length

use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BufMut};

use crate::record::CensusRecord;
use crate::schema::SchemaRef;
use crate::zone::{ZoneCode, ZONE_CODE_LEN};

/// Encodes the record into the given buffer.
///
/// Exactly `record_length` bytes are written.
pub fn encode_record<B: BufMut>(record: &CensusRecord, buf: &mut B) {
    buf.put_i64(record.record_id());
    for unit in record.zone_code().to_utf16() {
        buf.put_u16(unit);
    }
    for counter in record.counters() {
        buf.put_i32(*counter);
    }
}

/// Decodes a single record of the given table from the buffer.
///
/// The decode order mirrors [encode_record], any change to one must
/// be reflected in the other.
pub fn decode_record<B: Buf>(schema: &SchemaRef, buf: &mut B) -> io::Result<CensusRecord> {
    let record_length = schema.record_length() as usize;
    if buf.remaining() < record_length {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "{} record requires {record_length} bytes but only {} remain",
                schema.name(),
                buf.remaining(),
            ),
        ));
    }

    let record_id = buf.get_i64();

    let mut units = [0u16; ZONE_CODE_LEN];
    for unit in units.iter_mut() {
        *unit = buf.get_u16();
    }
    let zone_code = ZoneCode::from_utf16(units).ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("Record {record_id} has a zone code which is not valid UTF-16"),
        )
    })?;

    let counters = (0..schema.field_count())
        .map(|_| buf.get_i32())
        .collect::<Vec<_>>()
        .into_boxed_slice();

    Ok(CensusRecord::from_parts(
        schema.clone(),
        record_id,
        zone_code,
        counters,
    ))
}
