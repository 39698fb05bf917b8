// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "operadoras";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_API_TIMEOUT: &str = "30s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILE_NAME: &str = "operadoras.log";
const CONFIG_PATH_ENV: &str = "OPERADORAS_CONFIG_PATH";
const API_URL_ENV: &str = "OPERADORAS_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub path: Option<String>,
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            path: None,
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
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
                    "config file {} is not versioned. Add `version = 1` and put values under [api] and [log]",
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
        if let Some(base_url) = &self.api.base_url {
            let trimmed = base_url.trim();
            if trimmed.is_empty() {
                bail!("api.base_url in {} must not be empty", path.display());
            }
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!(
                    "api.base_url in {} must start with http:// or https://, got {:?}",
                    path.display(),
                    base_url
                );
            }
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("api.timeout in {}", path.display()))?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(log_path) = &self.log.path
            && log_path.trim().is_empty()
        {
            bail!(
                "log.path in {} must not be empty; remove it to use the default",
                path.display()
            );
        }

        if let Some(level) = &self.log.level
            && EnvFilter::try_new(level).is_err()
        {
            bail!(
                "log.level in {} is not a valid filter, got {:?} (try \"info\" or \"operadoras_app=debug\")",
                path.display(),
                level
            );
        }

        Ok(())
    }

    /// `[api].base_url`, then `OPERADORAS_API_URL`, then the local default.
    pub fn api_base_url(&self) -> String {
        let configured = self
            .api
            .base_url
            .clone()
            .or_else(|| env::var(API_URL_ENV).ok().filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        configured.trim().trim_end_matches('/').to_owned()
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => default_log_path(),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# operadoras config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# {} overrides base_url when this key is absent\nbase_url = \"{}\"\n# <N>ms, <N>s or <N>m\ntimeout = \"{}\"\n\n[log]\n# Optional. Default is the platform state dir (for example ~/.local/state/operadoras/operadoras.log)\n# path = \"/absolute/path/to/operadoras.log\"\n# RUST_LOG takes precedence when set\nlevel = \"{}\"\n",
            path.display(),
            API_URL_ENV,
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    let root = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow!("cannot resolve state directory; set [log].path in the config"))?;
    Ok(root.join(APP_NAME).join(LOG_FILE_NAME))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
