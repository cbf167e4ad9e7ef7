use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bon::Builder;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::record::{CensusRecord, RecordError};
use crate::rollup::ZoneRollup;
use crate::schema::SchemaRef;

/// How often a sample record is logged while formatting.
pub const DEFAULT_SAMPLE_INTERVAL: u64 = 10_000;

#[derive(Debug, Builder)]
/// Options used when opening a [TableStore].
pub struct TableStoreOptions {
    #[builder(into)]
    /// The path of the binary store file.
    path: PathBuf,
    /// The table held within the store.
    schema: SchemaRef,
    #[builder(default = DEFAULT_SAMPLE_INTERVAL)]
    /// The number of records between sample records being logged
    /// during formatting.
    ///
    /// `0` disables sampling.
    sample_interval: u64,
    #[builder(default = true)]
    /// Create the store file if it does not already exist.
    create: bool,
}

/// Zone codes (without padding) mapped to the ID of the record holding them.
type ZoneIndex = BTreeMap<String, i64>;

/// A binary store of fixed-length records for a single census table.
///
/// ### File Structure
///
/// The store is a flat file of concatenated records, each taking up exactly
/// [TableSchema::record_length](crate::TableSchema::record_length) bytes:
///
/// ```text
/// offset 0                 record_length        2 * record_length
/// ├── record 0 ────────────┼── record 1 ─────────┼── record 2 ── ...
/// ```
///
/// There is no header, the position of a record is its ID and lookups are
/// a single seek and read.
///
/// ### Concurrency
///
/// The file handle is guarded by a mutex so each seek and read pair is atomic,
/// readers can share the store but writes require exclusive access.
pub struct TableStore {
    schema: SchemaRef,
    path: PathBuf,
    record_length: u64,
    sample_interval: u64,
    /// The number of complete records within the file.
    num_records: u64,
    file: Mutex<File>,
    /// Built on the first zone lookup and dropped on any write.
    zone_index: Mutex<Option<Arc<ZoneIndex>>>,
}

impl TableStore {
    #[instrument(skip_all, fields(table = %options.schema.name(), path = %options.path.display()))]
    /// Opens the store at the configured path.
    ///
    /// If no store exists and [TableStoreOptions::create] is `false`, a
    /// [StoreError::StoreNotFound] error is returned.
    pub fn open(options: TableStoreOptions) -> Result<Self, StoreError> {
        let exists = options.path.try_exists()?;
        if !exists {
            if !options.create {
                return Err(StoreError::StoreNotFound(options.path));
            }
            info!("Create table store");
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create)
            .truncate(false)
            .open(&options.path)?;

        let record_length = options.schema.record_length();
        let file_length = file.metadata()?.len();
        let num_records = file_length / record_length;

        let trailing_bytes = file_length % record_length;
        if trailing_bytes != 0 {
            warn!(
                trailing_bytes,
                record_length, "Store ends with a partial record which will be ignored"
            );
        }

        info!(num_records, record_length, "Opened table store");

        Ok(Self {
            schema: options.schema,
            path: options.path,
            record_length,
            sample_interval: options.sample_interval,
            num_records,
            file: Mutex::new(file),
            zone_index: Mutex::new(None),
        })
    }

    #[inline]
    /// Returns the table held within the store.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[inline]
    /// Returns the path of the store file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    #[inline]
    /// The number of bytes each record takes up in the store.
    pub fn record_length(&self) -> u64 {
        self.record_length
    }

    #[inline]
    /// The number of complete records in the store.
    pub fn len(&self) -> u64 {
        self.num_records
    }

    #[inline]
    /// Returns if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    #[instrument(skip(self), fields(table = %self.schema.name()))]
    /// Formats the given source file into the store.
    ///
    /// The first line of the source is a header and is skipped, every
    /// following line becomes a record with IDs assigned sequentially from
    /// `start_id`.
    ///
    /// Returns the next available record ID, which allows several source
    /// files to be chained into the same store.
    pub fn format(&mut self, source: &Path, start_id: i64) -> Result<i64, StoreError> {
        let file = File::open(source).map_err(|e| StoreError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.format_reader(BufReader::new(file), start_id)
    }

    /// Formats every line of the reader into the store.
    ///
    /// This behaves the same as [TableStore::format].
    pub fn format_reader<R: BufRead>(&mut self, reader: R, start_id: i64) -> Result<i64, StoreError> {
        let offset = self.offset_of(start_id)?;

        if start_id as u64 != self.num_records {
            warn!(
                start_id,
                num_records = self.num_records,
                "Formatting does not start at the end of the store"
            );
        }

        self.invalidate_zone_index();

        let result = write_source_lines(
            self.file.get_mut(),
            offset,
            &self.schema,
            reader,
            start_id,
            self.sample_interval,
        );

        // Even on failure some records may have been written.
        self.refresh_len()?;

        let next_id = result?;
        info!(
            start_id,
            next_id,
            num_records = self.num_records,
            "Formatting complete"
        );

        Ok(next_id)
    }

    /// Writes a single record at the position of its ID.
    pub fn append(&mut self, record: &CensusRecord) -> Result<(), StoreError> {
        self.ensure_schema(record)?;

        let record_id = record.record_id();
        let offset = self.offset_of(record_id)?;

        self.invalidate_zone_index();

        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        record.write_binary(file)?;

        self.num_records = self.num_records.max(record_id as u64 + 1);
        trace!(record_id, "Appended record");

        Ok(())
    }

    /// Reads the record with the given ID.
    ///
    /// The record is located directly by its offset, no scanning occurs.
    pub fn get(&self, record_id: i64) -> Result<CensusRecord, StoreError> {
        if record_id < 0 || record_id as u64 >= self.num_records {
            return Err(StoreError::RecordOutOfRange {
                record_id,
                num_records: self.num_records,
            });
        }

        let record = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(record_id as u64 * self.record_length))?;
            CensusRecord::read_binary(self.schema.clone(), &mut *file)?
        };

        if record.record_id() != record_id {
            return Err(StoreError::Corrupted(format!(
                "Expected record {record_id} but found record {} at its offset",
                record.record_id(),
            )));
        }

        Ok(record)
    }

    /// Reads every record in the store in ID order, passing each to `op`.
    ///
    /// The store is locked for the duration of the scan.
    pub fn scan<F>(&self, mut op: F) -> Result<(), StoreError>
    where
        F: FnMut(CensusRecord) -> Result<(), StoreError>,
    {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut reader = BufReader::new(&mut *file);
        for _ in 0..self.num_records {
            let record = CensusRecord::read_binary(self.schema.clone(), &mut reader)?;
            op(record)?;
        }

        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.schema.name()))]
    /// Returns every record whose zone code starts with the given prefix,
    /// keyed by zone code.
    ///
    /// The first call scans the whole store to build a zone index which is
    /// reused until the store is next written to.
    pub fn index_by_zone_prefix(
        &self,
        prefix: &str,
    ) -> Result<BTreeMap<String, CensusRecord>, StoreError> {
        let index = self.zone_index()?;

        let range = (Bound::Included(prefix), Bound::Unbounded);
        let mut matches = BTreeMap::new();
        for (zone, record_id) in index
            .range::<str, _>(range)
            .take_while(|(zone, _)| zone.starts_with(prefix))
        {
            matches.insert(zone.clone(), self.get(*record_id)?);
        }

        debug!(num_matches = matches.len(), "Zone prefix lookup complete");

        Ok(matches)
    }

    /// Returns the record with the given zone code if it exists.
    pub fn get_by_zone(&self, zone_code: &str) -> Result<Option<CensusRecord>, StoreError> {
        let index = self.zone_index()?;
        let zone_code = zone_code.trim_end_matches(' ');
        match index.get(zone_code) {
            Some(record_id) => self.get(*record_id).map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, writer), fields(table = %self.schema.name()))]
    /// Writes the store as CSV, a header line followed by one line per record.
    ///
    /// Returns the number of records written.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<u64, StoreError> {
        let mut writer = BufWriter::new(writer);
        writeln!(writer, "{}", self.schema.csv_header())?;

        let mut num_written = 0;
        self.scan(|record| {
            writeln!(writer, "{}", record.to_csv_values())?;
            num_written += 1;
            Ok(())
        })?;
        writer.flush()?;

        info!(num_written, "Exported store as CSV");

        Ok(num_written)
    }

    #[instrument(skip(self, target), fields(table = %self.schema.name()))]
    /// Aggregates every record in the store into zones made up of the first
    /// `prefix_len` characters of each zone code, writing the results
    /// to the end of the target store.
    ///
    /// Returns the number of zone records written.
    pub fn rollup_into(&self, target: &mut TableStore, prefix_len: usize) -> Result<u64, StoreError> {
        if self.schema != target.schema {
            return Err(StoreError::Record(RecordError::SchemaMismatch {
                left: self.schema.name().to_string(),
                right: target.schema.name().to_string(),
            }));
        }

        let mut rollup = ZoneRollup::new(self.schema.clone(), prefix_len);
        self.scan(|record| rollup.add(&record).map_err(StoreError::from))?;

        let start_id = target.len() as i64;
        let zones = rollup.finish(start_id);
        for record in zones.iter() {
            target.append(record)?;
        }
        target.flush()?;

        info!(
            num_zones = zones.len(),
            start_id,
            target = %target.path.display(),
            "Rollup complete"
        );

        Ok(zones.len() as u64)
    }

    /// Ensures all written records are persisted to disk.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let file = self.file.get_mut();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn ensure_schema(&self, record: &CensusRecord) -> Result<(), StoreError> {
        if record.schema() != &self.schema {
            return Err(StoreError::Record(RecordError::SchemaMismatch {
                left: self.schema.name().to_string(),
                right: record.schema().name().to_string(),
            }));
        }
        Ok(())
    }

    /// The byte offset of the given record ID.
    ///
    /// IDs that are negative or whose offset does not fit in a `u64`
    /// are rejected.
    fn offset_of(&self, record_id: i64) -> Result<u64, StoreError> {
        u64::try_from(record_id)
            .ok()
            .and_then(|id| id.checked_mul(self.record_length))
            .ok_or(StoreError::InvalidRecordId(record_id))
    }

    fn refresh_len(&mut self) -> io::Result<()> {
        let file_length = self.file.get_mut().metadata()?.len();
        self.num_records = file_length / self.record_length;
        Ok(())
    }

    fn invalidate_zone_index(&mut self) {
        *self.zone_index.get_mut() = None;
    }

    fn zone_index(&self) -> Result<Arc<ZoneIndex>, StoreError> {
        let cached = self.zone_index.lock().clone();
        if let Some(index) = cached {
            return Ok(index);
        }

        debug!(num_records = self.num_records, "Building zone index");
        let mut index = ZoneIndex::new();
        self.scan(|record| {
            index.insert(record.zone_code().trimmed(), record.record_id());
            Ok(())
        })?;

        let index = Arc::new(index);
        *self.zone_index.lock() = Some(index.clone());

        Ok(index)
    }
}

/// Writes every line after the header of `reader` to the file, starting at
/// `offset`, returning the next unused record ID.
fn write_source_lines<R: BufRead>(
    file: &mut File,
    offset: u64,
    schema: &SchemaRef,
    reader: R,
    start_id: i64,
    sample_interval: u64,
) -> Result<i64, StoreError> {
    file.seek(SeekFrom::Start(offset))?;
    let mut writer = BufWriter::new(file);

    let mut lines = reader.lines();
    match lines.next() {
        Some(header) => {
            let header = header?;
            debug!(header = %header, "Skipping source header");
        },
        None => {
            warn!("Source is empty, no header was found");
            return Ok(start_id);
        },
    }

    let mut next_id = start_id;
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        // Line 1 is the header.
        let line_number = idx + 2;
        let record = CensusRecord::parse_line(schema.clone(), next_id, &line)
            .map_err(|source| StoreError::Parse {
                line: line_number,
                source,
            })?;
        record.write_binary(&mut writer)?;
        next_id = next_id
            .checked_add(1)
            .ok_or(StoreError::InvalidRecordId(next_id))?;

        let num_formatted = (next_id - start_id) as u64;
        if num_formatted.checked_rem(sample_interval) == Some(0) {
            info!(
                num_formatted,
                sample = %record.to_csv_values(),
                "Formatting progress"
            );
        }
    }

    writer.flush()?;

    Ok(next_id)
}

#[derive(Debug, thiserror::Error)]
/// An error that can occur when reading or writing a [TableStore].
pub enum StoreError {
    #[error("IO Error: {0}")]
    /// An IO error that occurred while attempting to complete
    /// the operation.
    IoError(#[from] io::Error),
    #[error("Unable to read source {path:?}: {source}")]
    /// The source text file is missing or unreadable.
    Source { path: PathBuf, source: io::Error },
    #[error("Record Error: {0}")]
    /// The record does not fit the table of the store.
    Record(#[from] RecordError),
    #[error("Failed to parse source line {line}: {source}")]
    /// A source line could not be parsed as a record.
    Parse { line: usize, source: RecordError },
    #[error("Store not found: {0:?}")]
    /// No store file exists at the given path.
    StoreNotFound(PathBuf),
    #[error("Record {record_id} is out of range, the store holds {num_records} records")]
    /// The record ID is past the end of the store.
    RecordOutOfRange { record_id: i64, num_records: u64 },
    #[error("Invalid record ID: {0}")]
    /// Record IDs are positions, they cannot be negative and their
    /// offset must fit within a file.
    InvalidRecordId(i64),
    #[error("Store Corrupted: {0}")]
    /// The data at a record offset does not hold the expected record.
    Corrupted(String),
}
