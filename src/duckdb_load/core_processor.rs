use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

use crate::config::LoaderConfig;
use crate::duckdb_load::normalizer::{self, NormalizedTable};
use crate::duckdb_load::table_loader::{LoadSummary, LoadTarget, TableLoader};
use crate::error::{EtlError, EtlResult};
use crate::file_load::{determine_file_type, FileType};

/// DuckDB table the reader fills.
pub const SOURCE_TABLE: &str = "data";

// Main processor struct that owns the DuckDB session for one run
// It detects the file type, loads the extensions that type needs,
// reads the file into the `data` table and hands out the normalized rows
pub struct CoreProcessor {
    file_path: PathBuf,
    sheet: Option<String>,
    file_type: FileType,
    conn: Connection,
}

impl CoreProcessor {
    /// Detect the file type and open an in-memory DuckDB session for it.
    pub fn open(file_path: &Path, sheet: Option<&str>) -> EtlResult<Self> {
        let file_type = determine_file_type(file_path)?;
        let conn = Connection::open_in_memory().map_err(|e| EtlError::unreadable(file_path, e))?;

        // Install and load required extensions
        for extension in file_type.required_extensions() {
            debug!(extension, "loading DuckDB extension");
            conn.execute_batch(&format!("INSTALL {extension}; LOAD {extension};"))
                .map_err(|e| EtlError::ExtensionUnavailable {
                    extension: *extension,
                    source: e,
                })?;
        }

        Ok(Self {
            file_path: file_path.to_path_buf(),
            sheet: sheet.map(str::to_string),
            file_type,
            conn,
        })
    }

    /// Read the source file into DuckDB and return its row count.
    pub fn read_source(&self) -> EtlResult<usize> {
        let query = create_table_query(self.file_type, &self.file_path, self.sheet.as_deref());
        debug!(%query, "reading source");
        self.conn
            .execute_batch(&query)
            .map_err(|e| EtlError::unreadable(&self.file_path, e))?;

        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {};", quote_duckdb_identifier(SOURCE_TABLE)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| EtlError::unreadable(&self.file_path, e))?;
        let count = usize::try_from(count).unwrap_or_default();
        info!(rows = count, file_type = %self.file_type, "source read");
        Ok(count)
    }

    /// Column names of the source table in header order.
    pub fn source_columns(&self) -> EtlResult<Vec<String>> {
        self.column_names()
            .map_err(|e| EtlError::unreadable(&self.file_path, e))
    }

    fn column_names(&self) -> duckdb::Result<Vec<String>> {
        let query = "
            SELECT column_name
            FROM information_schema.columns
            WHERE table_name = ?
            ORDER BY ordinal_position";
        let mut stmt = self.conn.prepare(query)?;
        let columns = stmt
            .query_map(params![SOURCE_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(?columns, "source columns");
        Ok(columns)
    }

    /// Stringify the source table. Errors here are not recoverable.
    pub fn normalize(&self) -> EtlResult<NormalizedTable> {
        let columns = self.column_names().map_err(EtlError::NormalizeFailed)?;
        normalizer::normalize(&self.conn, SOURCE_TABLE, &columns).map_err(EtlError::NormalizeFailed)
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub table: String,
    pub rows_read: usize,
    pub load: LoadSummary,
}

/// Read, normalize and load the configured source into the configured table.
///
/// Progress lines go to stdout. The loader is only called once the source
/// has been read and normalized, so a missing file never opens a connection.
pub fn run_pipeline(config: &LoaderConfig, loader: &mut dyn TableLoader) -> EtlResult<PipelineReport> {
    let source_file = &config.source.file;
    let table = config.destination.table_name(source_file);
    let span = info_span!("pipeline", source = %source_file.display(), %table);
    let _guard = span.enter();

    // Extract
    println!("Reading {}...", source_file.display());
    let processor = CoreProcessor::open(source_file, config.source.sheet.as_deref())?;
    let rows_read = processor.read_source()?;
    println!("Successfully read {rows_read} rows.");

    // Transform
    let normalized = processor.normalize()?;

    // Load
    let target = LoadTarget {
        schema: config.destination.schema.clone(),
        table: table.clone(),
        batch_size: config.destination.batch_size,
    };
    println!("Connecting to Database...");
    println!("Uploading to table '{table}'...");
    let load = loader.load_table(&normalized, &target)?;

    println!("SUCCESS! Data Pipeline Finished.");
    println!("Table '{table}' is ready.");
    Ok(PipelineReport {
        table,
        rows_read,
        load,
    })
}

/// Query that materialises a source file as the `data` table.
///
/// Workbooks are read as all-text without stopping at blank rows, so mixed
/// columns load and every row in the sheet is kept.
pub fn create_table_query(file_type: FileType, file_path: &Path, sheet: Option<&str>) -> String {
    let path = quote_duckdb_literal(&file_path.to_string_lossy());
    let sheet = sheet.map(quote_duckdb_literal);
    let reader = match (file_type, sheet) {
        (FileType::Excel, Some(sheet)) => format!(
            "read_xlsx({path}, header = true, all_varchar = true, stop_at_empty = false, sheet = {sheet})"
        ),
        (FileType::Excel, None) => format!(
            "read_xlsx({path}, header = true, all_varchar = true, stop_at_empty = false)"
        ),
        (FileType::LegacyExcel, Some(sheet)) => format!("st_read({path}, layer = {sheet})"),
        (FileType::LegacyExcel, None) => format!("st_read({path})"),
        (FileType::Csv, _) => format!("read_csv({path}, header = true)"),
        (FileType::Parquet, _) => format!("read_parquet({path})"),
    };
    format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM {};",
        quote_duckdb_identifier(SOURCE_TABLE),
        reader
    )
}

pub fn quote_duckdb_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_duckdb_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
