//! Diagnostic output
//!
//! Lines look like `2026-10-17T09:15:00Z INFO  [Weather Station] message`.
//! The configured level is the default filter; `RUST_LOG` overrides it.

use std::io::Write;

use env_logger::{Builder, Env};
use thiserror::Error;

use crate::config::LoggerConfig;

/// Logger setup errors
#[derive(Debug, Error)]
pub enum LoggerError {
    /// A global logger is already installed
    #[error("Failed to install logger: {0}")]
    Install(#[from] log::SetLoggerError),
}

/// Install the global logger
pub fn init(config: &LoggerConfig) -> Result<(), LoggerError> {
    let tag = config.tag.clone();
    let env = Env::default().default_filter_or(config.level.as_str());

    Builder::from_env(env)
        .format(move |buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                tag,
                record.args()
            )
        })
        .try_init()?;
    Ok(())
}
