//! Flat key/value configuration with typed getters
//!
//! Every parameter has a typed default installed at construction; an
//! engine config string (`key=value;key=value`) or a JSON config file can
//! override them. Values never change type after installation: overrides
//! are coerced to the type of the default they replace.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file root must be a JSON object")]
    NotAnObject,

    #[error("cannot parse `{value}` as a {expected} for key `{key}`")]
    BadValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("config entry `{0}` is not a `key=value` pair")]
    BadPair(String),

    #[error("unsupported JSON type for key `{0}`")]
    UnsupportedType(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Size(u64),
    Float(f64),
    Str(String),
}

pub struct Configuration {
    attributes: Mutex<HashMap<String, ConfigValue>>,
}

impl Configuration {
    pub fn new() -> Self {
        let config = Self {
            attributes: Mutex::new(HashMap::new()),
        };

        config.set_parameter("dbname", ConfigValue::Str("/var/lib/emberdb/ember.db".into()));
        config.set_parameter("max_vbuckets", ConfigValue::Size(1024));
        config.set_parameter("max_item_size", ConfigValue::Size(20 * 1024 * 1024));
        config.set_parameter("restore_mode", ConfigValue::Bool(false));
        config.set_parameter("restore_host", ConfigValue::Str("localhost".into()));
        config.set_parameter("restore_port", ConfigValue::Size(11210));
        config.set_parameter("restore_poll_count", ConfigValue::Size(1));
        config.set_parameter("restore_poll_interval_ms", ConfigValue::Size(1000));
        config.set_parameter("mutation_mem_threshold", ConfigValue::Float(0.9));

        config
    }

    pub fn set_parameter(&self, key: &str, value: ConfigValue) {
        self.lock().insert(key.to_string(), value);
    }

    /// Empty string when the key is unset or holds another type.
    pub fn get_string(&self, key: &str) -> String {
        match self.lock().get(key) {
            Some(ConfigValue::Str(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.lock().get(key), Some(ConfigValue::Bool(true)))
    }

    pub fn get_size(&self, key: &str) -> u64 {
        match self.lock().get(key) {
            Some(ConfigValue::Size(n)) => *n,
            _ => 0,
        }
    }

    pub fn get_float(&self, key: &str) -> f64 {
        match self.lock().get(key) {
            Some(ConfigValue::Float(f)) => *f,
            _ => 0.0,
        }
    }

    // The accessors the restore tool and harness consult.

    pub fn dbname(&self) -> String {
        self.get_string("dbname")
    }

    pub fn max_vbuckets(&self) -> u64 {
        self.get_size("max_vbuckets")
    }

    pub fn is_restore_mode(&self) -> bool {
        self.get_bool("restore_mode")
    }

    pub fn restore_host(&self) -> String {
        self.get_string("restore_host")
    }

    pub fn restore_port(&self) -> u16 {
        self.get_size("restore_port") as u16
    }

    pub fn restore_poll_count(&self) -> u64 {
        self.get_size("restore_poll_count")
    }

    pub fn restore_poll_interval_ms(&self) -> u64 {
        self.get_size("restore_poll_interval_ms")
    }

    /// Apply an engine config string: `key=value` pairs separated by `;`.
    pub fn apply_config_string(&self, config: &str) -> Result<(), ConfigError> {
        for pair in config.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::BadPair(pair.to_string()))?;
            let value = self.coerce(key.trim(), raw.trim())?;
            self.set_parameter(key.trim(), value);
        }
        Ok(())
    }

    /// Load overrides from a flat JSON object.
    pub fn load_file(&self, path: &Path) -> Result<(), ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let root: serde_json::Value = serde_json::from_reader(reader)?;
        let object = root.as_object().ok_or(ConfigError::NotAnObject)?;

        for (key, value) in object {
            let converted = match value {
                serde_json::Value::Bool(b) => ConfigValue::Bool(*b),
                serde_json::Value::Number(n) => match n.as_u64() {
                    Some(u) => ConfigValue::Size(u),
                    None => ConfigValue::Float(
                        n.as_f64()
                            .ok_or_else(|| ConfigError::UnsupportedType(key.clone()))?,
                    ),
                },
                serde_json::Value::String(s) => ConfigValue::Str(s.clone()),
                _ => return Err(ConfigError::UnsupportedType(key.clone())),
            };
            self.set_parameter(key, converted);
        }
        Ok(())
    }

    /// Parse `raw` against the type of the installed default, or infer a
    /// type for keys with no default.
    fn coerce(&self, key: &str, raw: &str) -> Result<ConfigValue, ConfigError> {
        let existing = self.lock().get(key).cloned();
        let bad = |expected: &'static str| ConfigError::BadValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        };

        match existing {
            Some(template) => match template {
                ConfigValue::Bool(_) => match raw {
                    "true" | "1" => Ok(ConfigValue::Bool(true)),
                    "false" | "0" => Ok(ConfigValue::Bool(false)),
                    _ => Err(bad("bool")),
                },
                ConfigValue::Size(_) => raw
                    .parse::<u64>()
                    .map(ConfigValue::Size)
                    .map_err(|_| bad("size")),
                ConfigValue::Float(_) => raw
                    .parse::<f64>()
                    .map(ConfigValue::Float)
                    .map_err(|_| bad("float")),
                ConfigValue::Str(_) => Ok(ConfigValue::Str(raw.to_string())),
            },
            None => Ok(if raw == "true" || raw == "false" {
                ConfigValue::Bool(raw == "true")
            } else if let Ok(n) = raw.parse::<u64>() {
                ConfigValue::Size(n)
            } else if let Ok(f) = raw.parse::<f64>() {
                ConfigValue::Float(f)
            } else {
                ConfigValue::Str(raw.to_string())
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConfigValue>> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Configuration::new();
        assert_eq!(config.restore_host(), "localhost");
        assert_eq!(config.restore_port(), 11210);
        assert_eq!(config.restore_poll_count(), 1);
        assert_eq!(config.max_vbuckets(), 1024);
        assert!(!config.is_restore_mode());
    }

    #[test]
    fn test_missing_keys_yield_zero_values() {
        let config = Configuration::new();
        assert_eq!(config.get_string("no_such_key"), "");
        assert!(!config.get_bool("no_such_key"));
        assert_eq!(config.get_size("no_such_key"), 0);
    }

    #[test]
    fn test_config_string_overrides() {
        let config = Configuration::new();
        config
            .apply_config_string("restore_mode=true;restore_port=11999; restore_host=backup01 ")
            .unwrap();
        assert!(config.is_restore_mode());
        assert_eq!(config.restore_port(), 11999);
        assert_eq!(config.restore_host(), "backup01");
    }

    #[test]
    fn test_config_string_type_mismatch() {
        let config = Configuration::new();
        let err = config
            .apply_config_string("restore_port=eleven")
            .unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { .. }));
        // The default survives a failed override.
        assert_eq!(config.restore_port(), 11210);
    }

    #[test]
    fn test_config_string_rejects_bare_words() {
        let config = Configuration::new();
        let err = config.apply_config_string("restore_mode").unwrap_err();
        assert!(matches!(err, ConfigError::BadPair(_)));
    }

    #[test]
    fn test_unknown_keys_infer_a_type() {
        let config = Configuration::new();
        config
            .apply_config_string("shard_count=4;verbose=true;label=nightly")
            .unwrap();
        assert_eq!(config.get_size("shard_count"), 4);
        assert!(config.get_bool("verbose"));
        assert_eq!(config.get_string("label"), "nightly");
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("emberdb.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(
            br#"{"restore_host": "standby", "restore_port": 12000, "restore_mode": true}"#,
        )
        .unwrap();

        let config = Configuration::new();
        config.load_file(&path).unwrap();
        assert_eq!(config.restore_host(), "standby");
        assert_eq!(config.restore_port(), 12000);
        assert!(config.is_restore_mode());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("emberdb.json");
        std::fs::write(&path, b"[1, 2, 3]").unwrap();

        let config = Configuration::new();
        assert!(matches!(
            config.load_file(&path),
            Err(ConfigError::NotAnObject)
        ));
    }
}
