//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over `[log] level` when it is set.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use spyglass_config::{LogConfig, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging
pub fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log.filter_directive()))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = make_writer(&log.output)?;
    let registry = tracing_subscriber::registry().with(filter);

    match log.format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).init(),
    }

    Ok(())
}

/// Writer for the configured destination, and whether it may get colors
fn make_writer(output: &LogOutput) -> Result<(BoxMakeWriter, bool)> {
    Ok(match output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
    })
}
