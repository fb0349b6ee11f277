//! Configuration loading from disk and environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use toml::{Table, Value};

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Directories searched when none are given.
pub const DEFAULT_DIRS: &[&str] = &[".", "config"];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config name cannot be empty")]
    EmptyName,

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {var}={value:?} is not a valid {expected}")]
    Env {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("failed to serialize defaults: {0}")]
    Defaults(#[from] toml::ser::Error),

    #[error("failed to unmarshal config: {0}")]
    Unmarshal(#[source] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Layered configuration source: defaults, then `<dir>/<name>.toml`, then
/// environment variables.
///
/// Every key present after the first two layers can be overridden by an
/// environment variable named after it (`server.port` → `SERVER_PORT`,
/// optionally prefixed). Extra variable names can be bound per key.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    name: String,
    dirs: Vec<PathBuf>,
    env_prefix: String,
    bind_env: BTreeMap<String, Vec<String>>,
    defaults: BTreeMap<String, Value>,
}

impl ConfigLoader {
    /// Loader for `<name>.toml` in the default directories.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dirs: DEFAULT_DIRS.iter().map(PathBuf::from).collect(),
            env_prefix: String::new(),
            bind_env: BTreeMap::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Prefix for automatic environment names (`APP` → `APP_SERVER_PORT`).
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Bind `key` to explicit environment variables. The first one set wins
    /// over the automatic name.
    pub fn bind_env<I, S>(mut self, key: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind_env
            .insert(key.into(), vars.into_iter().map(Into::into).collect());
        self
    }

    /// Value used when neither the file nor the environment sets `key`.
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Seed defaults from a serializable value. Keys already given a default
    /// keep it.
    pub fn defaults_from<T: Serialize>(mut self, value: &T) -> Result<Self, ConfigError> {
        let Value::Table(table) = Value::try_from(value)? else {
            return Ok(self);
        };
        let mut keys = Vec::new();
        leaf_keys(&table, "", &mut keys);
        for key in keys {
            if let Some(value) = get_path(&table, &key) {
                self.defaults.entry(key).or_insert_with(|| value.clone());
            }
        }
        Ok(self)
    }

    /// Load into `T`, reading the process environment.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.load_with_env(|var| std::env::var(var).ok())
    }

    /// Load into `T`, reading variables through `env`.
    pub fn load_with_env<T, F>(&self, env: F) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> Option<String>,
    {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let mut table = Table::new();
        for (key, value) in &self.defaults {
            set_path(&mut table, key, value.clone());
        }

        if let Some(path) = self.find_file() {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let file: Table = toml::from_str(&content)
                .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
            tracing::debug!(path = %path.display(), "Config file loaded");
            merge(&mut table, file);
        } else {
            tracing::debug!(name = %self.name, dirs = ?self.dirs, "No config file found, using defaults");
        }

        self.apply_env(&mut table, &env)?;

        Value::Table(table).try_into().map_err(ConfigError::Unmarshal)
    }

    fn find_file(&self) -> Option<PathBuf> {
        let file_name = format!("{}.toml", self.name);
        self.dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    fn env_name(&self, key: &str) -> String {
        let name = key.replace(['.', '-'], "_").to_ascii_uppercase();
        if self.env_prefix.is_empty() {
            name
        } else {
            format!("{}_{}", self.env_prefix.to_ascii_uppercase(), name)
        }
    }

    fn apply_env<F>(&self, table: &mut Table, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = Vec::new();
        leaf_keys(table, "", &mut keys);
        for key in self.bind_env.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        for key in keys {
            let bound = self.bind_env.get(&key).into_iter().flatten();
            let found = bound
                .chain(std::iter::once(&self.env_name(&key)))
                .find_map(|var| env(var).map(|value| (var.clone(), value)));

            if let Some((var, raw)) = found {
                let value = coerce(get_path(table, &key), &var, &raw)?;
                set_path(table, &key, value);
            }
        }
        Ok(())
    }
}

/// Load, then validate, an [`AppConfig`].
///
/// Every schema field is seeded as a default, so each one can be set from
/// the environment even when the file omits it.
pub fn load_config(loader: &ConfigLoader) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = loader
        .clone()
        .defaults_from(&AppConfig::default())?
        .load()?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate an [`AppConfig`] from one TOML file.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn set_path(table: &mut Table, key: &str, value: Value) {
    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts.pop().unwrap_or_default();
    let mut current = table;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        current = match entry {
            Value::Table(t) => t,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

fn get_path<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut value = table.get(parts.next()?)?;
    for part in parts {
        value = value.as_table()?.get(part)?;
    }
    Some(value)
}

fn leaf_keys(table: &Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Table(inner) => leaf_keys(inner, &path, out),
            _ => out.push(path),
        }
    }
}

/// Parse an environment string as the type already at that key, or infer one.
fn coerce(existing: Option<&Value>, var: &str, raw: &str) -> Result<Value, ConfigError> {
    let invalid = |expected| ConfigError::Env {
        var: var.to_string(),
        value: raw.to_string(),
        expected,
    };
    match existing {
        Some(Value::String(_)) => Ok(Value::String(raw.to_string())),
        Some(Value::Integer(_)) => raw
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| invalid("integer")),
        Some(Value::Float(_)) => raw
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| invalid("float")),
        Some(Value::Boolean(_)) => raw
            .trim()
            .parse()
            .map(Value::Boolean)
            .map_err(|_| invalid("boolean")),
        Some(Value::Array(_)) => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        _ => Ok(infer(raw)),
    }
}

fn infer(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Boolean(b)
    } else {
        Value::String(raw.to_string())
    }
}
