use crate::duckdb_load::normalizer::NormalizedTable;
use crate::error::EtlResult;

/// Where and how a normalized table is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTarget {
    pub schema: String,
    pub table: String,
    pub batch_size: usize,
}

impl LoadTarget {
    /// Bracket-quoted `[schema].[table]`.
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.schema),
            quote_identifier(&self.table)
        )
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_written: usize,
    pub batches: usize,
}

/// Strategy trait for writing a normalized table into a destination store.
///
/// Implementations replace whatever the destination holds under the target
/// name: the old table is dropped, a new one with one text column per source
/// column is created, and rows are sent in batches of `target.batch_size`.
pub trait TableLoader {
    fn load_table(&mut self, table: &NormalizedTable, target: &LoadTarget) -> EtlResult<LoadSummary>;
}

pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

pub fn drop_table_sql(target: &LoadTarget) -> String {
    let qualified = target.qualified_name();
    format!(
        "IF OBJECT_ID({}, N'U') IS NOT NULL DROP TABLE {};",
        quote_literal(&qualified),
        qualified
    )
}

pub fn create_table_sql(target: &LoadTarget, columns: &[String]) -> String {
    let column_defs = columns
        .iter()
        .map(|column| format!("{} NVARCHAR(MAX) NULL", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({});", target.qualified_name(), column_defs)
}

/// One multi-row INSERT for a batch; `None` cells are sent as NULL.
pub fn insert_batch_sql(target: &LoadTarget, columns: &[String], rows: &[Vec<Option<String>>]) -> String {
    let column_list = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            let cells = row
                .iter()
                .map(|cell| match cell {
                    Some(text) => quote_literal(text),
                    None => "NULL".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({cells})")
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "INSERT INTO {} ({}) VALUES\n{};",
        target.qualified_name(),
        column_list,
        values
    )
}
