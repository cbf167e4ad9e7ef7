//! Fixed-width binary record stores for UK Census Area Statistics (CAS) tables.
//!
//! A [TableSchema] describes the ordered counters of one table, a
//! [CensusRecord] is one row of that table and a [TableStore] holds many
//! records in a flat file where the position of a record is its ID.

mod codec;
mod record;
mod rollup;
mod schema;
mod store;
mod zone;

pub use self::codec::{decode_record, encode_record};
pub use self::record::{CensusRecord, RecordError, UNINITIALIZED_COUNTER, UNINITIALIZED_RECORD_ID};
pub use self::rollup::{rollup, ZoneRollup};
pub use self::schema::{SchemaError, SchemaRef, TableSchema};
pub use self::store::{StoreError, TableStore, TableStoreOptions, DEFAULT_SAMPLE_INTERVAL};
pub use self::zone::{ZoneCode, ZoneCodeError, ZONE_CODE_LEN};
