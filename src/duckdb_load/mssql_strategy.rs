use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::duckdb_load::normalizer::NormalizedTable;
use crate::duckdb_load::table_loader::{
    create_table_sql, drop_table_sql, insert_batch_sql, LoadSummary, LoadTarget, TableLoader,
};
use crate::error::{EtlError, EtlResult};

type SqlClient = Client<Compat<TcpStream>>;

/// Strategy for loading into Microsoft SQL Server over TDS.
///
/// Nothing touches the network until [`TableLoader::load_table`] is called.
/// The async client runs on a private current-thread runtime, so a load
/// blocks the caller from connect to commit.
///
/// # Panics
///
/// `load_table` calls `Runtime::block_on`, which panics when invoked from a
/// thread already driving a tokio runtime. Async callers have to move the
/// load onto a blocking thread, e.g. with `tokio::task::spawn_blocking`.
pub struct SqlServerLoader {
    connection: ConnectionConfig,
}

impl SqlServerLoader {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self { connection }
    }

    fn tiberius_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.connection.host);
        config.port(self.connection.port);
        config.database(&self.connection.database);
        config.application_name(env!("CARGO_PKG_NAME"));
        config.authentication(AuthMethod::sql_server(
            &self.connection.username,
            &self.connection.password,
        ));
        if self.connection.trust_server_certificate {
            config.trust_cert();
        }
        config
    }

    async fn connect(&self) -> EtlResult<SqlClient> {
        let config = self.tiberius_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| EtlError::ConnectionFailed(e.into()))?;
        tcp.set_nodelay(true)
            .map_err(|e| EtlError::ConnectionFailed(e.into()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(EtlError::ConnectionFailed)?;
        info!(
            host = %self.connection.host,
            port = self.connection.port,
            database = %self.connection.database,
            "connected to SQL Server"
        );
        Ok(client)
    }
}

impl TableLoader for SqlServerLoader {
    fn load_table(&mut self, table: &NormalizedTable, target: &LoadTarget) -> EtlResult<LoadSummary> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EtlError::ConnectionFailed(e.into()))?;

        runtime.block_on(async {
            let mut client = self.connect().await?;
            write_table(&mut client, table, target).await
        })
    }
}

// Drop, create and fill the table inside one transaction. On error the
// transaction is left open and the server rolls it back when the client drops.
async fn write_table(
    client: &mut SqlClient,
    table: &NormalizedTable,
    target: &LoadTarget,
) -> EtlResult<LoadSummary> {
    run_batch(client, "BEGIN TRANSACTION;").await?;

    let drop_sql = drop_table_sql(target);
    debug!(sql = %drop_sql, "dropping existing table");
    run_batch(client, &drop_sql).await?;

    let create_sql = create_table_sql(target, table.columns());
    debug!(sql = %create_sql, "creating table");
    run_batch(client, &create_sql).await?;

    let mut summary = LoadSummary {
        rows_written: 0,
        batches: 0,
    };
    for rows in table.batches(target.batch_size) {
        run_batch(client, &insert_batch_sql(target, table.columns(), rows)).await?;
        summary.batches += 1;
        summary.rows_written += rows.len();
        debug!(
            batch = summary.batches,
            rows_written = summary.rows_written,
            "batch written"
        );
    }

    run_batch(client, "COMMIT TRANSACTION;").await?;
    info!(
        table = %target.qualified_name(),
        rows = summary.rows_written,
        batches = summary.batches,
        "load committed"
    );
    Ok(summary)
}

async fn run_batch(client: &mut SqlClient, sql: &str) -> EtlResult<()> {
    client
        .simple_query(sql)
        .await
        .map_err(EtlError::WriteFailed)?
        .into_results()
        .await
        .map_err(EtlError::WriteFailed)?;
    Ok(())
}
