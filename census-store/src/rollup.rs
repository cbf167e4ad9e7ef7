//! Rolls records of small zones up into larger zones.
//!
//! Census geographies nest by code prefix, i.e. every output area of a
//! ward shares the ward's leading characters, so the coarser zone of a record
//! is the first `n` characters of its zone code.

use std::collections::BTreeMap;

use tracing::debug;

use crate::record::{CensusRecord, RecordError};
use crate::schema::SchemaRef;
use crate::zone::ZoneCode;

/// Accumulates records into one record per zone prefix.
pub struct ZoneRollup {
    schema: SchemaRef,
    prefix_len: usize,
    groups: BTreeMap<String, CensusRecord>,
}

impl ZoneRollup {
    /// Creates a new rollup which groups zones by their first `prefix_len`
    /// characters.
    pub fn new(schema: SchemaRef, prefix_len: usize) -> Self {
        Self {
            schema,
            prefix_len,
            groups: BTreeMap::new(),
        }
    }

    /// Adds the counters of the record to the group of its zone.
    pub fn add(&mut self, record: &CensusRecord) -> Result<(), RecordError> {
        let prefix: String = record
            .zone_code()
            .trimmed()
            .chars()
            .take(self.prefix_len)
            .collect();

        let total = match self.groups.get(&prefix) {
            Some(total) => total.aggregate_as(record, 0, &prefix)?,
            None => {
                debug!(zone = %prefix, "Starting new zone group");
                let zone_code = ZoneCode::new(&prefix)?;
                CensusRecord::zeroed(self.schema.clone(), 0, zone_code)
                    .aggregate_as(record, 0, &prefix)?
            },
        };

        self.groups.insert(prefix, total);

        Ok(())
    }

    /// Returns the number of distinct zones seen so far.
    pub fn num_zones(&self) -> usize {
        self.groups.len()
    }

    /// Completes the rollup, numbering the zone records sequentially from
    /// `start_id` in ascending zone code order.
    pub fn finish(self, start_id: i64) -> Vec<CensusRecord> {
        self.groups
            .into_values()
            .zip(start_id..)
            .map(|(total, record_id)| {
                CensusRecord::from_parts(
                    self.schema.clone(),
                    record_id,
                    total.zone_code(),
                    total.counters().into(),
                )
            })
            .collect()
    }
}

/// Rolls the given records up into one record per zone prefix.
///
/// Returns an empty list if no records are provided.
pub fn rollup<'a, I>(
    records: I,
    prefix_len: usize,
    start_id: i64,
) -> Result<Vec<CensusRecord>, RecordError>
where
    I: IntoIterator<Item = &'a CensusRecord>,
{
    let mut records = records.into_iter().peekable();
    let Some(first) = records.peek() else {
        return Ok(Vec::new());
    };

    let mut rollup = ZoneRollup::new(first.schema().clone(), prefix_len);
    for record in records {
        rollup.add(record)?;
    }

    Ok(rollup.finish(start_id))
}
