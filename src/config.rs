//! Run configuration.
//!
//! [`LoaderConfig`] is parsed once at start-up from command line flags, with
//! environment variables (and a `.env` file loaded by the binary) as
//! fallbacks. It is never mutated afterwards; the reader and the loader each
//! receive the part they need by reference.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser};

use crate::file_load::clean_table_name;

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Rows sent per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// T-SQL caps a table value constructor at 1000 rows.
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "duckdb-mssql",
    about = "Load a spreadsheet into a SQL Server table, every column as text",
    version
)]
pub struct LoaderConfig {
    #[command(flatten)]
    pub source: SourceConfig,

    #[command(flatten)]
    pub connection: ConnectionConfig,

    #[command(flatten)]
    pub destination: DestinationConfig,
}

/// Where the data comes from.
#[derive(Debug, Clone, Args)]
pub struct SourceConfig {
    /// Spreadsheet to load (.xlsx, .xls, .csv or .parquet)
    #[arg(env = "SOURCE_FILE")]
    pub file: PathBuf,

    /// Worksheet to read instead of the first one
    #[arg(long, env = "SOURCE_SHEET")]
    pub sheet: Option<String>,
}

/// How to reach the database server.
#[derive(Clone, Args)]
pub struct ConnectionConfig {
    #[arg(long, env = "MSSQL_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long, env = "MSSQL_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "MSSQL_DATABASE")]
    pub database: String,

    #[arg(long, env = "MSSQL_USER")]
    pub username: String,

    #[arg(long, env = "MSSQL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Accept the server's TLS certificate without validation
    #[arg(
        long,
        env = "MSSQL_TRUST_CERT",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub trust_server_certificate: bool,
}

// Keep the password out of logs and panics
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"********")
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

/// Where the data goes.
#[derive(Debug, Clone, Args)]
pub struct DestinationConfig {
    #[arg(long, env = "MSSQL_SCHEMA", default_value = "dbo")]
    pub schema: String,

    /// Destination table; defaults to the source file name without extension
    #[arg(long, env = "DESTINATION_TABLE")]
    pub table: Option<String>,

    /// Rows per INSERT batch
    #[arg(
        long,
        env = "BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = parse_batch_size
    )]
    pub batch_size: usize,
}

impl DestinationConfig {
    /// Configured table name, or one derived from the source file name.
    pub fn table_name(&self, source_file: &Path) -> String {
        match &self.table {
            Some(table) => table.trim().to_string(),
            None => {
                let file_name = source_file
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default();
                clean_table_name(&file_name)
            }
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("'{value}' is not a whole number"))?;
    if (1..=MAX_BATCH_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(format!("batch size must be between 1 and {MAX_BATCH_SIZE}"))
    }
}
