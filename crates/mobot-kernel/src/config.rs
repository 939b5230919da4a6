//! [`ConfigStore`] – live-tunable, lazily-defaulted configuration.
//!
//! Every tunable is looked up by a dotted key at the moment it is used, with
//! the default supplied at the call site:
//!
//! ```
//! use mobot_kernel::config::{ConfigProvider, ConfigStore};
//!
//! let config = ConfigStore::new();
//! let stop = config.get_or_add_float("distanceChecker.stopDistance", 0.2);
//! assert_eq!(stop, 0.2);
//!
//! // The default was recorded and will be persisted with the file.
//! assert!(config.is_dirty());
//! assert!(config.to_toml_string().unwrap().contains("[distanceChecker]"));
//! ```
//!
//! Changing a value through [`ConfigStore::set`] takes effect on the next
//! control cycle; nothing caches it.
//!
//! On disk the dotted keys become nested TOML tables, so
//! `distanceChecker.stopDistance` is written as `stopDistance` under
//! `[distanceChecker]`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use mobot_types::MobotError;
use toml::{Table, Value};
use tracing::warn;

/// Typed, lazily-defaulted key/value lookups.
///
/// A missing key is inserted with the supplied default.  A key holding a
/// value of the wrong type is left alone and the default returned.
pub trait ConfigProvider: Send + Sync {
    fn get_or_add_float(&self, key: &str, default: f64) -> f64;
    fn get_or_add_int(&self, key: &str, default: i64) -> i64;
    fn get_or_add_bool(&self, key: &str, default: bool) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl ConfigValue {
    /// Parse a value typed by hand (REPL, environment): integers, then
    /// floats, then booleans, otherwise text.
    pub fn parse_loose(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            ConfigValue::Int(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            ConfigValue::Float(v)
        } else if let Ok(v) = raw.parse::<bool>() {
            ConfigValue::Bool(v)
        } else {
            ConfigValue::Text(raw.to_string())
        }
    }

    fn to_toml(&self) -> Value {
        match self {
            ConfigValue::Float(v) => Value::Float(*v),
            ConfigValue::Int(v) => Value::Integer(*v),
            ConfigValue::Bool(v) => Value::Boolean(*v),
            ConfigValue::Text(v) => Value::String(v.clone()),
        }
    }
}

/// In-memory [`ConfigProvider`] with TOML import/export.
#[derive(Default)]
pub struct ConfigStore {
    values: RwLock<BTreeMap<String, ConfigValue>>,
    dirty: AtomicBool,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from TOML text.  The result starts clean.
    ///
    /// # Errors
    ///
    /// [`MobotError::Config`] if the text is not valid TOML.  Values of an
    /// unsupported type (arrays, dates) are skipped with a warning.
    pub fn from_toml_str(text: &str) -> Result<Self, MobotError> {
        let table: Table = text
            .parse()
            .map_err(|e: toml::de::Error| MobotError::Config(e.to_string()))?;
        let mut values = BTreeMap::new();
        flatten("", &table, &mut values);
        Ok(Self {
            values: RwLock::new(values),
            dirty: AtomicBool::new(false),
        })
    }

    /// Render as nested TOML tables.
    ///
    /// # Errors
    ///
    /// [`MobotError::Config`] if a key is both a value and a table prefix,
    /// e.g. `wander.scan` alongside `wander.scan.inc`.
    pub fn to_toml_string(&self) -> Result<String, MobotError> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let mut root = Table::new();
        for (key, value) in values.iter() {
            insert_nested(&mut root, key, value.to_toml())?;
        }
        toml::to_string(&root).map_err(|e| MobotError::Config(e.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// `true` if anything changed since load or the last
    /// [`mark_clean`][Self::mark_clean].
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    fn get_or_add(&self, key: &str, default: ConfigValue) -> ConfigValue {
        if let Some(v) = self.get(key) {
            return v;
        }
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values
            .entry(key.to_string())
            .or_insert_with(|| {
                self.dirty.store(true, Ordering::SeqCst);
                default
            })
            .clone()
    }
}

impl ConfigProvider for ConfigStore {
    fn get_or_add_float(&self, key: &str, default: f64) -> f64 {
        match self.get_or_add(key, ConfigValue::Float(default)) {
            ConfigValue::Float(v) => v,
            ConfigValue::Int(v) => v as f64,
            other => {
                warn!(key, value = %other, "config value is not a number, using default");
                default
            }
        }
    }

    fn get_or_add_int(&self, key: &str, default: i64) -> i64 {
        match self.get_or_add(key, ConfigValue::Int(default)) {
            ConfigValue::Int(v) => v,
            ConfigValue::Float(v) if v.is_finite() => v as i64,
            other => {
                warn!(key, value = %other, "config value is not an integer, using default");
                default
            }
        }
    }

    fn get_or_add_bool(&self, key: &str, default: bool) -> bool {
        match self.get_or_add(key, ConfigValue::Bool(default)) {
            ConfigValue::Bool(v) => v,
            other => {
                warn!(key, value = %other, "config value is not a boolean, using default");
                default
            }
        }
    }
}

fn flatten(prefix: &str, table: &Table, out: &mut BTreeMap<String, ConfigValue>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let v = match value {
            Value::Table(inner) => {
                flatten(&key, inner, out);
                continue;
            }
            Value::Float(v) => ConfigValue::Float(*v),
            Value::Integer(v) => ConfigValue::Int(*v),
            Value::Boolean(v) => ConfigValue::Bool(*v),
            Value::String(v) => ConfigValue::Text(v.clone()),
            other => {
                warn!(key, kind = other.type_str(), "unsupported config value skipped");
                continue;
            }
        };
        out.insert(key, v);
    }
}

fn insert_nested(root: &mut Table, key: &str, value: Value) -> Result<(), MobotError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let leaf = parts.pop().unwrap_or(key);
    let mut table = root;
    for part in parts {
        let entry = table
            .entry(part.to_string())
            .or_insert(Value::Table(Table::new()));
        table = match entry {
            Value::Table(t) => t,
            _ => {
                return Err(MobotError::Config(format!(
                    "key '{key}' conflicts with value at '{part}'"
                )));
            }
        };
    }
    if let Some(Value::Table(_)) = table.get(leaf) {
        return Err(MobotError::Config(format!(
            "key '{key}' conflicts with a table of the same name"
        )));
    }
    table.insert(leaf.to_string(), value);
    Ok(())
}
