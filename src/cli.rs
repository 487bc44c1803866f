use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;

use crate::backup;
use crate::config::Config;
use crate::database::Database;
use crate::error::BbuError;
use crate::export::{self, ExportFormat};
use crate::records::{ImportEntry, SerialRecord};
use crate::server::WebServer;

#[derive(Parser)]
#[command(
    name = "bbu_tracker",
    version,
    about = "bbu_tracker: BBU serial number scan counter"
)]
pub struct Cli {
    /// Configuration file (default: config.toml in the app data directory)
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server (default if no command specified)
    Serve,

    /// Record one scan of a serial number
    Scan {
        /// Serial number as scanned (spaces are ignored)
        serial: String,
    },

    /// Show the count for a serial, or serials scanned more than a threshold
    Count {
        /// Serial number to look up
        #[arg(long = "serial", short = 's', conflicts_with = "threshold")]
        serial: Option<String>,

        /// List serials scanned more than this many times
        #[arg(long = "threshold", short = 't', allow_negative_numbers = true)]
        threshold: Option<i64>,
    },

    /// Import records from a JSON document
    Import {
        /// Path to a JSON array of records
        file: PathBuf,
    },

    /// Export records as CSV or as a JSON snapshot
    Export {
        /// Output format
        #[arg(long = "format", short = 'f', default_value = "csv")]
        format: ExportFormat,

        /// Only export serials scanned more than this many times (CSV only)
        #[arg(long = "threshold", short = 't', allow_negative_numbers = true)]
        threshold: Option<i64>,

        /// Write to this file instead of stdout
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
    },

    /// Delete every record and move the database to a timestamped backup
    Clear {
        /// Confirm the destructive clear
        #[arg(long = "yes")]
        yes: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn handle_command(self, config: Config) -> Result<(), BbuError> {
        // Default to Serve if no command specified
        match self.command.unwrap_or(Command::Serve) {
            Command::Serve => Self::start_server(config),
            Command::Scan { serial } => Self::scan(&config, &serial),
            Command::Count { serial, threshold } => Self::count(&config, serial, threshold),
            Command::Import { file } => Self::import(&config, &file),
            Command::Export {
                format,
                threshold,
                output,
            } => Self::export(&config, format, threshold, output),
            Command::Clear { yes } => Self::clear(&config, yes),
        }
    }

    fn start_server(config: Config) -> Result<(), BbuError> {
        info!("Starting server on {}:{}", config.server.host, config.server.port);

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| BbuError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let web_server = WebServer::new(&config.server, config.storage);
            web_server.start().await
        })
    }

    fn scan(config: &Config, serial: &str) -> Result<(), BbuError> {
        let mut db = Database::open(&config.storage)?;
        let count = SerialRecord::record_scan(&mut db, serial)?;

        println!(
            "Recorded {} (scanned {} time(s), last at {})",
            crate::serial::normalize(serial),
            count.total_count,
            count.last_used.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    fn count(config: &Config, serial: Option<String>, threshold: Option<i64>) -> Result<(), BbuError> {
        let db = Database::open(&config.storage)?;

        match (serial, threshold) {
            (Some(serial), _) => {
                let serial = crate::serial::normalize(&serial);
                match SerialRecord::lookup(&db, &serial)? {
                    Some(found) => println!(
                        "The serial number {} has been scanned {} time(s). Last scanned time: {}",
                        serial,
                        found.total_count,
                        found.last_used.as_deref().unwrap_or("unknown")
                    ),
                    None => println!("The serial number {} has not been scanned yet.", serial),
                }
            }
            (None, Some(threshold)) => {
                let records = SerialRecord::above_threshold(&db, threshold)?;
                if records.is_empty() {
                    println!("No serial numbers have been scanned more than {} time(s).", threshold);
                }
                for record in records {
                    println!(
                        "{}  {:>6}  {}",
                        record.serial,
                        record.total_count,
                        record.last_used.as_deref().unwrap_or("")
                    );
                }
            }
            (None, None) => {
                return Err(BbuError::Error(
                    "Specify --serial or --threshold".to_string(),
                ))
            }
        }

        Ok(())
    }

    fn import(config: &Config, file: &Path) -> Result<(), BbuError> {
        let content = fs::read_to_string(file)?;
        let entries: Vec<ImportEntry> = serde_json::from_str(&content)?;

        let mut db = Database::open(&config.storage)?;
        let summary = SerialRecord::import(&mut db, &entries)?;

        println!(
            "Imported {} record(s): {} duplicate(s) skipped, {} rejected",
            summary.inserted, summary.skipped_duplicates, summary.rejected
        );
        Ok(())
    }

    fn export(
        config: &Config,
        format: ExportFormat,
        threshold: Option<i64>,
        output: Option<PathBuf>,
    ) -> Result<(), BbuError> {
        let db = Database::open(&config.storage)?;

        let text = match (format, threshold) {
            (ExportFormat::Csv, None) => export::export_all(&db)?,
            (ExportFormat::Csv, Some(threshold)) => export::export_above_threshold(&db, threshold)?,
            (ExportFormat::Json, None) => export::write_snapshot(&db, &config.storage)?,
            (ExportFormat::Json, Some(_)) => {
                return Err(BbuError::Error(
                    "--threshold is only supported for CSV export".to_string(),
                ))
            }
        };

        match output {
            Some(path) => {
                fs::write(&path, text)?;
                println!("Exported {} to {}", format, path.display());
            }
            None => print!("{}", text),
        }

        Ok(())
    }

    fn clear(config: &Config, yes: bool) -> Result<(), BbuError> {
        if !yes {
            return Err(BbuError::Error(
                "Refusing to clear the database without --yes".to_string(),
            ));
        }

        let db = Database::open(&config.storage)?;
        let outcome = backup::clear_all(db, &config.storage)?;

        println!("Database cleared successfully! {} record(s) removed.", outcome.deleted);
        if let Some(path) = outcome.db_backup {
            println!("Database backup: {}", path.display());
        }
        if let Some(path) = outcome.snapshot_backup {
            println!("Snapshot backup: {}", path.display());
        }
        Ok(())
    }
}
