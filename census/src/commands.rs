use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use census_store::{CensusRecord, TableStore, TableStoreOptions, DEFAULT_SAMPLE_INTERVAL};
use census_tables::CasTable;
use clap::Subcommand;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Format source CSV files into the table store
    Format {
        #[arg(required = true)]
        /// The source CSV files to format.
        ///
        /// The first line of each file is a header and is skipped. Files are
        /// formatted in the order given with consecutive record IDs.
        ///
        /// Use `-` to read from stdin.
        sources: Vec<PathBuf>,
        #[arg(long)]
        /// The ID of the first formatted record.
        ///
        /// Defaults to the end of the store so existing records are kept.
        start_id: Option<i64>,
        #[arg(long, env = "CENSUS_SAMPLE_INTERVAL", default_value_t = DEFAULT_SAMPLE_INTERVAL)]
        /// Log a sample record every N records, `0` disables sampling.
        sample_interval: u64,
    },
    /// Print a single record by its ID
    Get {
        /// The ID of the record.
        record_id: i64,
        #[arg(long)]
        /// Print the record as JSON rather than CSV.
        json: bool,
    },
    /// Print every record whose zone code starts with a prefix
    Index {
        /// The zone code prefix, e.g. `00AA`.
        prefix: String,
        #[arg(long)]
        /// Print the records as JSON rather than CSV.
        json: bool,
    },
    /// Export the whole store as CSV
    Export {
        #[arg(short, long)]
        /// The file to write to, defaults to stdout.
        output: Option<PathBuf>,
    },
    /// Aggregate the store into larger zones
    Rollup {
        #[arg(long)]
        /// The store file to write the aggregated zones to.
        ///
        /// Records are added after any already in the target.
        target: PathBuf,
        #[arg(long)]
        /// The number of leading zone code characters shared by
        /// every small zone within a larger zone.
        prefix_len: usize,
    },
    /// List the known census tables
    Tables,
}

impl Commands {
    /// Triggers any additional startup messages which are aware
    /// of the provided subcommand.
    pub fn display_startup_message(&self, table: CasTable, store_path: &Path) {
        match self {
            Commands::Format { sources, start_id, .. } => {
                info!(
                    table = %table,
                    store = %store_path.display(),
                    num_sources = sources.len(),
                    start_id = ?start_id,
                    "Formatting source files"
                );
            },
            Commands::Rollup { target, prefix_len } => {
                info!(
                    table = %table,
                    store = %store_path.display(),
                    target = %target.display(),
                    prefix_len,
                    "Rolling up zones"
                );
            },
            Commands::Get { .. } | Commands::Index { .. } | Commands::Export { .. } => {
                info!(table = %table, store = %store_path.display(), "Reading table store");
            },
            Commands::Tables => {},
        }
    }

    /// Executes the command
    pub fn execute(self, table: CasTable, store_path: PathBuf) -> Result<()> {
        match self {
            Commands::Format {
                sources,
                start_id,
                sample_interval,
            } => format(table, store_path, sources, start_id, sample_interval)?,
            Commands::Get { record_id, json } => {
                let store = open_populated(table, store_path)?;
                let record = store
                    .get(record_id)
                    .with_context(|| format!("Get record {record_id}"))?;
                print_records(&[record], json)?;
            },
            Commands::Index { prefix, json } => {
                let store = open_populated(table, store_path)?;
                let matches = store
                    .index_by_zone_prefix(&prefix)
                    .with_context(|| format!("Index zones with prefix {prefix:?}"))?;
                let records: Vec<CensusRecord> = matches.into_values().collect();
                print_records(&records, json)?;
            },
            Commands::Export { output } => {
                let store = open_existing(table, store_path)?;
                match output {
                    Some(path) => {
                        let file = File::create(&path)
                            .with_context(|| format!("Create {}", path.display()))?;
                        store.export_csv(file)?;
                    },
                    None => {
                        store.export_csv(std::io::stdout().lock())?;
                    },
                }
            },
            Commands::Rollup { target, prefix_len } => {
                let store = open_populated(table, store_path)?;
                let options = TableStoreOptions::builder()
                    .path(target)
                    .schema(table.schema())
                    .build();
                let mut target = TableStore::open(options).context("Open target store")?;
                store.rollup_into(&mut target, prefix_len)?;
            },
            Commands::Tables => {
                let mut stdout = std::io::stdout().lock();
                for table in CasTable::ALL {
                    let schema = table.schema();
                    writeln!(
                        stdout,
                        "{}\t{} fields\t{} bytes per record\t{}",
                        table,
                        schema.field_count(),
                        schema.record_length(),
                        table.description(),
                    )?;
                }
            },
        }

        Ok(())
    }
}

fn format(
    table: CasTable,
    store_path: PathBuf,
    sources: Vec<PathBuf>,
    start_id: Option<i64>,
    sample_interval: u64,
) -> Result<()> {
    let options = TableStoreOptions::builder()
        .path(store_path)
        .schema(table.schema())
        .sample_interval(sample_interval)
        .build();
    let mut store = TableStore::open(options).context("Open table store")?;

    let mut next_id = match start_id {
        Some(start_id) => start_id,
        None => store.len() as i64,
    };

    for source in sources {
        next_id = if source.as_os_str() == "-" {
            store
                .format_reader(std::io::stdin().lock(), next_id)
                .context("Format stdin")?
        } else {
            store
                .format(&source, next_id)
                .with_context(|| format!("Format {}", source.display()))?
        };
    }
    store.flush()?;

    writeln!(std::io::stdout().lock(), "{next_id}")?;

    Ok(())
}

fn open_existing(table: CasTable, store_path: PathBuf) -> Result<TableStore> {
    let options = TableStoreOptions::builder()
        .path(store_path)
        .schema(table.schema())
        .create(false)
        .build();
    TableStore::open(options).context("Open table store")
}

/// Opens an existing store which must hold at least one record.
fn open_populated(table: CasTable, store_path: PathBuf) -> Result<TableStore> {
    let store = open_existing(table, store_path)?;

    if store.is_empty() {
        bail!("The {table} store holds no records, run `census format` first");
    }

    Ok(store)
}

fn print_records(records: &[CensusRecord], json: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut stdout, records)?;
        writeln!(stdout)?;
        return Ok(());
    }

    if let Some(first) = records.first() {
        writeln!(stdout, "{}", first.csv_header())?;
    }
    for record in records {
        writeln!(stdout, "{}", record.to_csv_values())?;
    }

    Ok(())
}
