use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bulk-load delimited files into SQL Server tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bulk-load a delimited file into a destination table
    Load(LoadArgs),
    /// Scan a file for field values exceeding declared column lengths
    Audit(AuditArgs),
    /// Run an import described by a JSON job request (trigger entry point)
    Job(JobArgs),
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// SQL Server instance name or address
    #[arg(short = 's', long)]
    pub server: String,
    /// TCP port of the instance
    #[arg(long, default_value_t = 1433)]
    pub port: u16,
    /// Database name
    #[arg(short = 'd', long)]
    pub database: String,
    /// SQL login username (omit with --trusted)
    #[arg(short = 'u', long)]
    pub username: Option<String>,
    /// SQL login password (omit with --trusted)
    #[arg(short = 'p', long)]
    pub password: Option<String>,
    /// Use integrated (Windows) authentication instead of a SQL login
    #[arg(long)]
    pub trusted: bool,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input delimited file to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination table name
    #[arg(short = 't', long)]
    pub table: String,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// First row contains column headers; drop it before loading
    #[arg(long = "first-row-columns")]
    pub first_row_columns: bool,
    /// Drop the first row before loading
    #[arg(long = "skip-header-row")]
    pub skip_header_row: bool,
    /// Truncate the destination table before loading (irreversible)
    #[arg(long)]
    pub truncate: bool,
    /// Disable indexes before the load and rebuild them after
    #[arg(long = "manage-indexes")]
    pub manage_indexes: bool,
    /// Disable constraint checking before the load and re-enable it after
    #[arg(long = "manage-constraints")]
    pub manage_constraints: bool,
    /// Request an exclusive table lock during the load
    #[arg(long = "table-lock")]
    pub table_lock: bool,
    /// Row-level errors tolerated before the load aborts (0 = all-or-nothing)
    #[arg(long = "max-errors", default_value_t = 0)]
    pub max_errors: u32,
    /// Rows per batch for the row-insert fallback loader
    #[arg(long = "batch-size", default_value_t = 5000)]
    pub batch_size: usize,
    /// Statement timeout in seconds
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,
    /// Preset: larger batches, longer timeout, index/constraint management,
    /// table lock
    #[arg(long = "high-performance")]
    pub high_performance: bool,
    /// Load with batched INSERT statements instead of BULK INSERT (for
    /// servers that cannot read the client filesystem)
    #[arg(long = "row-inserts")]
    pub row_inserts: bool,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Input delimited file to scan
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination table whose column lengths to audit against
    #[arg(short = 't', long)]
    pub table: String,
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Drop the first row before scanning
    #[arg(long = "skip-header-row")]
    pub skip_header_row: bool,
    /// Emit violations as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// JSON job request file ('-' for stdin)
    #[arg(short = 'r', long = "request")]
    pub request: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
