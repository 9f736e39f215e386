// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "STOCKPILE_LOG";
const LOG_FILE_NAME: &str = "stockpile.log";

/// Routes `tracing` output to a file; the terminal belongs to the UI.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let dir = config.log_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("create log directory {} -- set [log].dir", dir.display()))?;

    let filter = log_filter(env::var(LOG_ENV).ok().as_deref(), config.log_level())?;
    let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;
    Ok(guard)
}

fn log_filter(env_value: Option<&str>, config_level: &str) -> Result<EnvFilter> {
    match env_value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value {directives:?}")),
        None => EnvFilter::try_new(config_level)
            .with_context(|| format!("invalid [log].level {config_level:?}")),
    }
}
