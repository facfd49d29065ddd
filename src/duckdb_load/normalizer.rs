use duckdb::Connection;
use tracing::{debug, info};

use crate::duckdb_load::core_processor::quote_duckdb_identifier;

/// Text a missing value turns into once stringified.
pub const MISSING_VALUE_TEXT: &str = "nan";

/// Table where every cell is text or null, in source column and row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl NormalizedTable {
    /// Build a table, rejecting any row whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self, String> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(format!(
                "row {} has {} cells, expected {}",
                index,
                row.len(),
                columns.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Consecutive slices of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Vec<Option<String>>> {
        self.rows.chunks(batch_size.max(1))
    }
}

/// Map a stringified cell to the destination null marker when it reads `nan`.
///
/// Runs after stringification, so a genuine text value `nan` is nulled as well.
pub fn null_if_missing(text: Option<String>) -> Option<String> {
    text.filter(|value| value != MISSING_VALUE_TEXT)
}

// SELECT list casting every column to VARCHAR, keeping names and order
fn stringify_select(source_table: &str, columns: &[String]) -> String {
    let casts = columns
        .iter()
        .map(|column| {
            let quoted = quote_duckdb_identifier(column);
            format!("CAST({quoted} AS VARCHAR) AS {quoted}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {};",
        casts,
        quote_duckdb_identifier(source_table)
    )
}

/// Stringify every column of `source_table` and apply the missing-value rule.
pub fn normalize(
    conn: &Connection,
    source_table: &str,
    columns: &[String],
) -> Result<NormalizedTable, duckdb::Error> {
    let query = stringify_select(source_table, columns);
    debug!(%query, "stringifying columns");

    let mut stmt = conn.prepare(&query)?;
    let mut result = stmt.query([])?;
    let mut rows = Vec::new();
    let mut nulled = 0usize;

    while let Some(row) = result.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            let text: Option<String> = row.get(index)?;
            let cell = null_if_missing(text);
            if cell.is_none() {
                nulled += 1;
            }
            cells.push(cell);
        }
        rows.push(cells);
    }

    info!(rows = rows.len(), null_cells = nulled, "dataset normalized");
    Ok(NormalizedTable {
        columns: columns.to_vec(),
        rows,
    })
}
