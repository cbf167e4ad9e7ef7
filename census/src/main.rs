mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use census_tables::CasTable;
use clap::Parser;
use tracing::info;

use crate::logging::init_logging;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(version, about)]
/// census, format and query Census Area Statistics tables.
///
/// Source CSV extracts are formatted into fixed-width binary stores where
/// any record can be read back directly by its ID, listed by zone or
/// rolled up into larger zones.
pub struct Args {
    #[arg(long, env = "CENSUS_LOG_LEVEL", default_value = "info")]
    /// Set the log level.
    ///
    /// This can filter on various levels, for example `info,census_store=warn`
    /// will display all logs at `info` level severity and above, except for log
    /// events that appear within the `census_store` crate.
    log_level: String,
    #[arg(long, env = "CENSUS_LOG_JSON")]
    /// Emit logs in JSON format rather than as plain text.
    log_json: bool,
    #[arg(long, env = "CENSUS_LOG_NO_ANSI")]
    /// Disable ANSI colour codes being present in the logs.
    ///
    /// ANSI codes can cause rendering issues on various observability platforms
    /// or text file logging due to its escape sequences.
    log_no_ansi: bool,
    #[arg(short, long, env = "CENSUS_TABLE", default_value = "CAS001")]
    /// The census table to operate on, e.g. `CAS001`.
    table: CasTable,
    #[arg(long, env = "CENSUS_DATA_PATH", default_value = ".")]
    /// The directory holding the table stores.
    ///
    /// Each table is stored in its own `<table>.bin` file within this directory.
    data_path: PathBuf,
    #[command(subcommand)]
    command: commands::Commands,
}

impl Args {
    /// The path of the store file for the selected table.
    fn store_path(&self) -> PathBuf {
        self.data_path
            .join(self.table.code().to_ascii_lowercase())
            .with_extension("bin")
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)
        .context("Init logging")?;

    info!("census v{}", env!("CARGO_PKG_VERSION"));

    let store_path = args.store_path();
    args.command.display_startup_message(args.table, &store_path);
    args.command
        .execute(args.table, store_path)
        .context("Run command")?;

    Ok(())
}
