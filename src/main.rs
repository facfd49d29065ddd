use std::process::ExitCode;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use duckdb_mssql::logging::init_logging;
use duckdb_mssql::{run_pipeline, EtlError, LoaderConfig, SqlServerLoader, Stage};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: LoaderConfig,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

fn main() -> Result<ExitCode, EtlError> {
    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbosity.tracing_level_filter()) {
        eprintln!("ERROR: failed to initialize logging: {error}");
    }

    let mut loader = SqlServerLoader::new(cli.config.connection.clone());
    match run_pipeline(&cli.config, &mut loader) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(error) => match error.stage() {
            Stage::Read => {
                match error.hint() {
                    Some(hint) => eprintln!("ERROR: {error}. {hint}"),
                    None => eprintln!("ERROR: {error}"),
                }
                Ok(ExitCode::FAILURE)
            }
            Stage::Load => {
                eprintln!("ERROR: {error}");
                Ok(ExitCode::FAILURE)
            }
            // Normalizer failures are not expected; let them surface as-is
            Stage::Normalize => Err(error),
        },
    }
}
