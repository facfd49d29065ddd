//! Tracing subscriber setup for the binary.
//!
//! Diagnostics go to stderr so stdout only carries the progress lines.
//! `RUST_LOG` overrides the level picked on the command line.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging(level: LevelFilter) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::try_from_default_env()?,
        Err(_) => EnvFilter::default().add_directive(level.into()),
    };

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}
