//! Load a spreadsheet into a SQL Server table with every column as text.
//!
//! The pipeline has three sequential stages:
//!
//! 1. read the source file into an in-memory DuckDB table,
//! 2. cast every column to text and turn `nan` cells into NULL,
//! 3. drop and recreate the destination table and insert the rows in batches.
//!
//! [`run_pipeline`] drives all three; the destination is any [`TableLoader`],
//! normally [`SqlServerLoader`].

pub mod config;
pub mod duckdb_load;
pub mod error;
pub mod file_load;
pub mod logging;

pub use config::LoaderConfig;
pub use duckdb_load::core_processor::{run_pipeline, CoreProcessor, PipelineReport};
pub use duckdb_load::mssql_strategy::SqlServerLoader;
pub use duckdb_load::normalizer::NormalizedTable;
pub use duckdb_load::table_loader::{LoadSummary, LoadTarget, TableLoader};
pub use error::{EtlError, EtlResult, Stage};
pub use file_load::FileType;
