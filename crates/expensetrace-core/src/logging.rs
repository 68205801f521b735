//! Logger bootstrap
//!
//! Builds the tracing subscriber from [`LoggerConfig`]. Only binaries call
//! [`init`]; library code just emits events.
//!
//! Priority for the level: `RUST_LOG` > configured level.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LogLevel, LogOutput, LoggerConfig};
use crate::error::{Error, Result};

/// Install the global subscriber described by `config`
///
/// Fails if a subscriber is already installed or the log file cannot be
/// opened.
pub fn init(config: &LoggerConfig) -> Result<()> {
    let filter = env_filter(config.level);
    let writer = make_writer(&config.output)?;
    let ansi = matches!(config.output, LogOutput::Stdout | LogOutput::Stderr);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(ansi)
                    .compact()
                    .with_writer(writer),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("cannot install logger: {}", e)))
}

/// `RUST_LOG` when set and valid, else the configured level
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Writer for a configured output; files are opened for append
pub fn make_writer(output: &LogOutput) -> Result<BoxMakeWriter> {
    Ok(match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Discard => BoxMakeWriter::new(std::io::sink),
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
    })
}
