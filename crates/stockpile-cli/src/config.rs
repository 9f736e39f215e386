// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockpile_app::{DEFAULT_CURRENCY_SYMBOL, UiSettings};

const CONFIG_VERSION: i64 = 1;
const DEFAULT_REMOTE_TIMEOUT: &str = "5s";
const DEFAULT_SEARCH_DEBOUNCE: &str = "100ms";
const DEFAULT_HEALTH_CHECK_INTERVAL: &str = "5s";
const DEFAULT_NOTICE_DURATION: &str = "3s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            store: StoreSection::default(),
            remote: Remote::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Remote {
    pub config_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            config_url: None,
            timeout: Some(DEFAULT_REMOTE_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub currency_symbol: Option<String>,
    pub search_debounce: Option<String>,
    pub health_check_interval: Option<String>,
    pub notice_duration: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            currency_symbol: Some(DEFAULT_CURRENCY_SYMBOL.to_owned()),
            search_debounce: Some(DEFAULT_SEARCH_DEBOUNCE.to_owned()),
            health_check_interval: Some(DEFAULT_HEALTH_CHECK_INTERVAL.to_owned()),
            notice_duration: Some(DEFAULT_NOTICE_DURATION.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("STOCKPILE_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set STOCKPILE_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(stockpile_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [store], [remote], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.store.db_path {
            stockpile_db::validate_db_path(db_path)?;
        }

        for (key, value) in [
            ("remote.timeout", &self.remote.timeout),
            ("ui.search_debounce", &self.ui.search_debounce),
            ("ui.health_check_interval", &self.ui.health_check_interval),
            ("ui.notice_duration", &self.ui.notice_duration),
        ] {
            if let Some(raw) = value {
                let parsed = parse_duration(raw)
                    .with_context(|| format!("{key} in {}", path.display()))?;
                if parsed.is_zero() {
                    bail!("{key} in {} must be positive, got {raw}", path.display());
                }
            }
        }

        if let Some(symbol) = &self.ui.currency_symbol
            && symbol.trim().is_empty()
        {
            bail!(
                "ui.currency_symbol in {} must not be blank; remove it to use {DEFAULT_CURRENCY_SYMBOL}",
                path.display()
            );
        }

        Ok(())
    }

    /// `project_id` names the database file when neither `[store].db_path`
    /// nor `STOCKPILE_DB_PATH` is set.
    pub fn db_path(&self, project_id: Option<&str>) -> Result<PathBuf> {
        match &self.store.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => stockpile_db::default_db_path(project_id),
        }
    }

    pub fn remote_config_url(&self) -> Option<&str> {
        self.remote
            .config_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn remote_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.remote
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT),
        )
    }

    pub fn ui_settings(&self) -> Result<UiSettings> {
        let duration = |value: &Option<String>, fallback: &str| {
            parse_duration(value.as_deref().unwrap_or(fallback))
        };
        Ok(UiSettings {
            currency_symbol: self
                .ui
                .currency_symbol
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_owned()),
            search_debounce: duration(&self.ui.search_debounce, DEFAULT_SEARCH_DEBOUNCE)?,
            health_check_interval: duration(
                &self.ui.health_check_interval,
                DEFAULT_HEALTH_CHECK_INTERVAL,
            )?,
            notice_duration: duration(&self.ui.notice_duration, DEFAULT_NOTICE_DURATION)?,
        })
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.log.dir {
            return Ok(PathBuf::from(dir));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].dir in the config file")
        })?;
        Ok(data_root.join(stockpile_db::APP_NAME).join("logs"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# stockpile config\n# Place this file at: {}\n\nversion = 1\n\n[store]\n# Optional. Default is the platform data dir, named after the fetched project id\n# (for example ~/.local/share/stockpile/stockpile.db)\n# db_path = \"/absolute/path/to/stockpile.db\"\n\n[remote]\n# Optional. Endpoint that hands out the store settings at startup\n# config_url = \"http://127.0.0.1:8000/get-store-config/\"\ntimeout = \"{}\"\n\n[ui]\ncurrency_symbol = \"{}\"\nsearch_debounce = \"{}\"\nhealth_check_interval = \"{}\"\nnotice_duration = \"{}\"\n\n[log]\nlevel = \"{}\"\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            DEFAULT_REMOTE_TIMEOUT,
            DEFAULT_CURRENCY_SYMBOL,
            DEFAULT_SEARCH_DEBOUNCE,
            DEFAULT_HEALTH_CHECK_INTERVAL,
            DEFAULT_NOTICE_DURATION,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
