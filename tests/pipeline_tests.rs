use duckdb_mssql::config::{ConnectionConfig, DestinationConfig, SourceConfig};
use duckdb_mssql::{
    run_pipeline, EtlError, EtlResult, LoadSummary, LoadTarget, LoaderConfig, NormalizedTable,
    SqlServerLoader, Stage, TableLoader,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// In-memory destination with drop-and-recreate semantics.
#[derive(Default)]
struct MemoryLoader {
    tables: HashMap<String, NormalizedTable>,
    calls: usize,
    batch_sizes: Vec<usize>,
}

impl TableLoader for MemoryLoader {
    fn load_table(&mut self, table: &NormalizedTable, target: &LoadTarget) -> EtlResult<LoadSummary> {
        self.calls += 1;
        let name = target.qualified_name();
        self.tables.remove(&name);

        let mut rows = Vec::new();
        let mut batches = 0;
        for batch in table.batches(target.batch_size) {
            self.batch_sizes.push(batch.len());
            rows.extend(batch.iter().cloned());
            batches += 1;
        }
        let rows_written = rows.len();
        self.tables.insert(
            name,
            NormalizedTable::new(table.columns().to_vec(), rows).unwrap(),
        );
        Ok(LoadSummary {
            rows_written,
            batches,
        })
    }
}

/// Destination that is never reachable.
struct UnreachableLoader;

impl TableLoader for UnreachableLoader {
    fn load_table(&mut self, _: &NormalizedTable, _: &LoadTarget) -> EtlResult<LoadSummary> {
        Err(EtlError::ConnectionFailed(
            io::Error::new(io::ErrorKind::ConnectionRefused, "host unreachable").into(),
        ))
    }
}

fn config_for(file: &Path, table: Option<&str>) -> LoaderConfig {
    LoaderConfig {
        source: SourceConfig {
            file: file.to_path_buf(),
            sheet: None,
        },
        connection: ConnectionConfig {
            host: "127.0.0.1".into(),
            port: 1,
            database: "PortfolioProject".into(),
            username: "sa".into(),
            password: "not-a-real-password".into(),
            trust_server_certificate: true,
        },
        destination: DestinationConfig {
            schema: "dbo".into(),
            table: table.map(str::to_string),
            batch_size: 500,
        },
    }
}

fn housing_csv(rows: usize) -> NamedTempFile {
    let mut temp_file = NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(temp_file, "UniqueID,ParcelID,PropertyAddress,SalePrice,OwnerName").unwrap();
    for i in 0..rows {
        // every seventh owner is missing
        let owner = if i % 7 == 0 { String::new() } else { format!("OWNER {i}") };
        writeln!(
            temp_file,
            "{},{:03} 00 0 {}.00,{} MAIN ST,{},{}",
            i,
            i % 200,
            i,
            100 + i,
            1000 * i,
            owner
        )
        .unwrap();
    }
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_replaces_existing_table_and_preserves_rows() {
    let source = housing_csv(2000);
    let config = config_for(source.path(), Some("NashvilleHousing"));

    let mut loader = MemoryLoader::default();
    let old_rows = (0..10).map(|i| vec![Some(i.to_string()), None]).collect();
    loader.tables.insert(
        "[dbo].[NashvilleHousing]".into(),
        NormalizedTable::new(vec!["Legacy".into(), "Other".into()], old_rows).unwrap(),
    );

    let report = run_pipeline(&config, &mut loader).unwrap();

    assert_eq!(report.rows_read, 2000);
    assert_eq!(report.load.rows_written, 2000);
    assert_eq!(report.load.batches, 4);
    assert_eq!(loader.batch_sizes, vec![500, 500, 500, 500]);

    let written = &loader.tables["[dbo].[NashvilleHousing]"];
    assert_eq!(
        written.columns(),
        ["UniqueID", "ParcelID", "PropertyAddress", "SalePrice", "OwnerName"]
    );
    assert_eq!(written.row_count(), 2000);
    assert!(written.rows().iter().all(|row| row.len() == 5));
    assert_eq!(written.rows()[0][4], None);
    assert_eq!(written.rows()[1][4].as_deref(), Some("OWNER 1"));
    assert_eq!(written.rows()[1999][0].as_deref(), Some("1999"));
}

#[test]
fn test_running_twice_gives_identical_table() {
    let source = housing_csv(1203);
    let config = config_for(source.path(), Some("NashvilleHousing"));
    let mut loader = MemoryLoader::default();

    run_pipeline(&config, &mut loader).unwrap();
    let first = loader.tables["[dbo].[NashvilleHousing]"].clone();
    run_pipeline(&config, &mut loader).unwrap();
    let second = &loader.tables["[dbo].[NashvilleHousing]"];

    assert_eq!(&first, second);
    assert_eq!(second.row_count(), 1203);
    assert_eq!(loader.tables.len(), 1);
    assert_eq!(loader.calls, 2);
}

#[test]
fn test_table_name_defaults_to_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("NashvilleHousing.csv");
    std::fs::write(&path, "a,b\n1,2\n").unwrap();

    let mut loader = MemoryLoader::default();
    let report = run_pipeline(&config_for(&path, None), &mut loader).unwrap();

    assert_eq!(report.table, "NashvilleHousing");
    assert!(loader.tables.contains_key("[dbo].[NashvilleHousing]"));
}

#[test]
fn test_missing_source_never_reaches_the_loader() {
    let missing = PathBuf::from("NashvilleHousingDataforDataCleaning.xlsx");
    let mut loader = MemoryLoader::default();

    let err = run_pipeline(&config_for(&missing, Some("NashvilleHousing")), &mut loader).unwrap_err();

    assert_eq!(err.stage(), Stage::Read);
    assert!(matches!(err, EtlError::SourceNotFound { .. }));
    assert!(err.to_string().contains("NashvilleHousingDataforDataCleaning.xlsx"));
    assert_eq!(err.source_path(), Some(&missing));
    assert_eq!(loader.calls, 0);
    assert!(loader.tables.is_empty());
}

#[test]
fn test_load_failure_is_reported_with_cause() {
    let source = housing_csv(10);
    let config = config_for(source.path(), Some("NashvilleHousing"));

    let err = run_pipeline(&config, &mut UnreachableLoader).unwrap_err();

    assert_eq!(err.stage(), Stage::Load);
    assert!(err.to_string().contains("host unreachable"));
}

#[test]
fn test_sql_server_unreachable_is_connection_failure() {
    let source = housing_csv(10);
    // Nothing listens on port 1 of the loopback interface
    let config = config_for(source.path(), Some("NashvilleHousing"));
    let mut loader = SqlServerLoader::new(config.connection.clone());

    let err = run_pipeline(&config, &mut loader).unwrap_err();

    assert!(matches!(err, EtlError::ConnectionFailed(_)));
    assert_eq!(err.stage(), Stage::Load);
}

#[test]
fn test_sql_server_loader_runs_from_async_code_via_spawn_blocking() {
    let config = config_for(Path::new("unused.csv"), Some("NashvilleHousing"));
    let mut loader = SqlServerLoader::new(config.connection.clone());
    let table = NormalizedTable::new(vec!["id".into()], vec![vec![Some("1".into())]]).unwrap();
    let target = LoadTarget {
        schema: "dbo".into(),
        table: "NashvilleHousing".into(),
        batch_size: 500,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let result = runtime.block_on(async move {
        tokio::task::spawn_blocking(move || loader.load_table(&table, &target))
            .await
            .unwrap()
    });

    assert!(matches!(result, Err(EtlError::ConnectionFailed(_))));
}
