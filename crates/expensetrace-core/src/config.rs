//! Configuration
//!
//! Values come from an optional YAML file (`EXPENSETRACE_CONFIG`, default
//! `expensetrace.yml`) and are then overridden by environment variables:
//!
//! - `EXPENSETRACE_DB`: database location
//! - `EXPENSETRACE_LOG_LEVEL`: debug, info, warn or error
//! - `EXPENSETRACE_LOG_FORMAT`: text or json
//! - `EXPENSETRACE_LOG_OUTPUT`: stdout, stderr, discard or a file path

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "EXPENSETRACE_CONFIG";
pub const DB_ENV: &str = "EXPENSETRACE_DB";
pub const LOG_LEVEL_ENV: &str = "EXPENSETRACE_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "EXPENSETRACE_LOG_FORMAT";
pub const LOG_OUTPUT_ENV: &str = "EXPENSETRACE_LOG_OUTPUT";

pub const DEFAULT_CONFIG_PATH: &str = "expensetrace.yml";
pub const DEFAULT_DB_PATH: &str = "expensetrace.db";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path of the SQLite file
    pub source: String,
    /// Maximum pooled connections
    pub max_open_conns: u32,
    /// How long a statement waits on a locked database
    pub busy_timeout_ms: u64,
    /// How long a caller waits for a pooled connection
    pub connection_timeout_secs: u64,
    pub journal_mode: String,
    pub synchronous: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_DB_PATH.to_string(),
            max_open_conns: 4,
            busy_timeout_ms: 5000,
            connection_timeout_secs: 30,
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    Discard,
    File(PathBuf),
}

impl std::str::FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" => Err("empty log output".to_string()),
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "discard" => Ok(Self::Discard),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

impl TryFrom<String> for LogOutput {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogOutput> for String {
    fn from(value: LogOutput) -> Self {
        match value {
            LogOutput::Stdout => "stdout".to_string(),
            LogOutput::Stderr => "stderr".to_string(),
            LogOutput::Discard => "discard".to_string(),
            LogOutput::File(path) => path.display().to_string(),
        }
    }
}

impl Config {
    /// Load from the file named by `EXPENSETRACE_CONFIG`, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path, |key| std::env::var(key).ok())
    }

    /// Load from an explicit file with a custom variable lookup
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Override fields from environment-style variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db) = var(DB_ENV) {
            self.db.source = db;
        }
        if let Some(level) = var(LOG_LEVEL_ENV) {
            self.logger.level = parse_env(LOG_LEVEL_ENV, &level)?;
        }
        if let Some(format) = var(LOG_FORMAT_ENV) {
            self.logger.format = parse_env(LOG_FORMAT_ENV, &format)?;
        }
        if let Some(output) = var(LOG_OUTPUT_ENV) {
            self.logger.output = parse_env(LOG_OUTPUT_ENV, &output)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr<Err = String>>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{}: {}", key, e)))
}
