// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! File logging. The terminal belongs to the TUI, so everything goes to a
//! log file that can be followed with `tail -f`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("create log directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log path {0:?} has no file name")]
    InvalidPath(PathBuf),
    #[error("tracing subscriber already initialized")]
    SubscriberAlreadySet,
}

/// `RUST_LOG` wins when set; otherwise `level` from the config applies.
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(log_path: &Path, level: &str) -> Result<(), LoggingError> {
    let file_name = log_path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(log_path.to_path_buf()))?;
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&directory).map_err(|source| LoggingError::DirectoryCreation {
        path: directory.clone(),
        source,
    })?;

    let file_appender = tracing_appender::rolling::never(&directory, file_name);

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}
