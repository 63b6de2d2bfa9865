//! Tracing initialization
//!
//! Log verbosity is controlled by `RUST_LOG` (env-filter syntax); defaults
//! to `info` for the engine and `warn` for everything else.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber. Safe to call once per process;
/// subsequent calls return an error from `try_init` which callers may
/// ignore in tests.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,swarmbench_engine=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {}", e))?;

    Ok(())
}
