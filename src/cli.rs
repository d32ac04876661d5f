//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::error::CloseCacheError;
use crate::domain::observation::Observation;
use crate::domain::sync::CloseDataSync;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{ManagedStore, SeriesStore};

#[derive(Parser, Debug)]
#[command(name = "closecache", about = "Cached daily closing prices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print daily closes for a symbol, fetching whatever the cache is missing
    Close {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
        /// First date (YYYY-MM-DD), defaults to 1970-01-01
        #[arg(long)]
        start: Option<String>,
        /// Last date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,
    },
    /// Show the cached date range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
    },
    /// Create the price table
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
        /// Drop all cached prices and recreate the table
        #[arg(long)]
        reset: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Close {
            config,
            symbol,
            start,
            end,
        } => run_close(&config, &symbol, start.as_deref(), end.as_deref()),
        Command::Info { config, symbol } => run_info(&config, &symbol),
        Command::InitDb { config, reset } => run_init_db(&config, reset),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CloseCacheError> {
    FileConfigAdapter::from_file(path).map_err(|e| CloseCacheError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_date_arg(value: Option<&str>) -> Result<Option<NaiveDate>, CloseCacheError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|_| {
                CloseCacheError::InvalidDate {
                    value: v.to_string(),
                }
            })
        })
        .transpose()
}

/// Open the configured store. A `[postgres] connection_string` selects
/// PostgreSQL when that backend is compiled in; otherwise `[sqlite] path`.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn ManagedStore>, CloseCacheError> {
    #[cfg(feature = "postgres")]
    if config.get_string("postgres", "connection_string").is_some() {
        use crate::adapters::postgres_adapter::PostgresAdapter;
        return Ok(Box::new(PostgresAdapter::from_config(config)?));
    }

    #[cfg(feature = "sqlite")]
    let store: Result<Box<dyn ManagedStore>, CloseCacheError> = {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        SqliteAdapter::from_config(config).map(|s| Box::new(s) as Box<dyn ManagedStore>)
    };

    #[cfg(not(feature = "sqlite"))]
    let store: Result<Box<dyn ManagedStore>, CloseCacheError> = {
        let _ = config;
        Err(CloseCacheError::ConfigMissing {
            section: "postgres".into(),
            key: "connection_string".into(),
        })
    };

    store
}

pub fn write_observations<W: Write>(out: W, rows: &[Observation]) -> Result<(), CloseCacheError> {
    let mut wtr = csv::Writer::from_writer(out);
    let io_err = |e: csv::Error| CloseCacheError::Io(std::io::Error::other(e));

    wtr.write_record(["symbol", "date", "close"]).map_err(io_err)?;
    for row in rows {
        let date = row.date.format("%Y-%m-%d").to_string();
        let close = row.close.to_string();
        wtr.write_record([row.symbol.as_str(), date.as_str(), close.as_str()])
            .map_err(io_err)?;
    }
    wtr.flush()?;
    Ok(())
}

fn run_close(
    config_path: &Path,
    symbol: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(), CloseCacheError> {
    let start = parse_date_arg(start)?;
    let end = parse_date_arg(end)?;

    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    store.initialize_schema()?;
    let fetcher = YahooAdapter::from_config(&config)?;

    let sync = CloseDataSync::new(store, fetcher);
    let rows = sync.get_close_data(symbol, start, end)?;

    write_observations(std::io::stdout().lock(), &rows)?;
    eprintln!("{} rows for {}", rows.len(), symbol);
    Ok(())
}

fn run_info(config_path: &Path, symbol: &str) -> Result<(), CloseCacheError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    store.initialize_schema()?;

    match store.data_range(symbol)? {
        Some((min_date, max_date, count)) => {
            println!("{symbol}: {count} rows, {min_date} to {max_date}");
        }
        None => eprintln!("{symbol}: no cached data"),
    }
    Ok(())
}

fn run_init_db(config_path: &Path, reset: bool) -> Result<(), CloseCacheError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    if reset {
        tracing::warn!("dropping all cached prices");
        store.reset_schema()?;
        eprintln!("Price table recreated");
    } else {
        store.initialize_schema()?;
        eprintln!("Price table ready");
    }
    Ok(())
}
