//! Logging configuration using tracing

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// `filter` is an `EnvFilter` directive such as `info` or
/// `statetree_core=trace,info`. Logs go to stderr so stdout stays clean for
/// the walk report.
pub fn init(filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(filter)
        .map_err(|e| anyhow!("invalid log filter {filter:?}: {e}"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()
        .map_err(|e| anyhow!("logging already initialised: {e}"))?;

    Ok(())
}
