use snap_plugin_error::{PluginError, Result};
use snap_plugin_proto::rpc;
use std::collections::BTreeMap;
use std::fmt;

/// A single config value as carried by [`rpc::ConfigMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ConfigValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int64",
            ConfigValue::Float(_) => "float64",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(v) => write!(f, "{v}"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

/// Key/value configuration handed to plugins along with metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config(BTreeMap<String, ConfigValue>);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    fn lookup(&self, key: &str) -> Result<&ConfigValue> {
        self.0
            .get(key)
            .ok_or_else(|| PluginError::ConfigNotFound(key.to_string()))
    }

    fn mistyped(key: &str, expected: &'static str) -> PluginError {
        PluginError::ConfigType {
            key: key.to_string(),
            expected,
        }
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        match self.lookup(key)? {
            ConfigValue::String(v) => Ok(v),
            _ => Err(Self::mistyped(key, "string")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.lookup(key)? {
            ConfigValue::Bool(v) => Ok(*v),
            _ => Err(Self::mistyped(key, "bool")),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.lookup(key)? {
            ConfigValue::Int(v) => Ok(*v),
            _ => Err(Self::mistyped(key, "int64")),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.lookup(key)? {
            ConfigValue::Float(v) => Ok(*v),
            _ => Err(Self::mistyped(key, "float64")),
        }
    }

    /// Build a config from a JSON object such as the one given on the
    /// command line in diagnostics mode.
    ///
    /// Integral numbers become [`ConfigValue::Int`], other numbers
    /// [`ConfigValue::Float`]. `null` entries are treated as absent; arrays
    /// and objects cannot be represented and are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(PluginError::UnsupportedValue {
                    key: String::new(),
                    kind: json_kind(other),
                });
            }
        };

        let mut config = Self::default();
        for (key, value) in object {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => ConfigValue::String(s.clone()),
                Value::Bool(b) => ConfigValue::Bool(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => ConfigValue::Int(i),
                    None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
                },
                other => {
                    return Err(PluginError::UnsupportedValue {
                        key: key.clone(),
                        kind: json_kind(other),
                    });
                }
            };
            config.0.insert(key.clone(), value);
        }
        Ok(config)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl FromIterator<(String, ConfigValue)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<rpc::ConfigMap> for Config {
    fn from(map: rpc::ConfigMap) -> Self {
        let mut config = Config::default();
        for (k, v) in map.int_map {
            config.0.insert(k, ConfigValue::Int(v));
        }
        for (k, v) in map.string_map {
            config.0.insert(k, ConfigValue::String(v));
        }
        for (k, v) in map.bool_map {
            config.0.insert(k, ConfigValue::Bool(v));
        }
        for (k, v) in map.float_map {
            config.0.insert(k, ConfigValue::Float(v));
        }
        config
    }
}

impl From<Option<rpc::ConfigMap>> for Config {
    fn from(map: Option<rpc::ConfigMap>) -> Self {
        map.map(Config::from).unwrap_or_default()
    }
}

impl From<Config> for rpc::ConfigMap {
    fn from(config: Config) -> Self {
        let mut map = rpc::ConfigMap::default();
        for (k, v) in config.0 {
            match v {
                ConfigValue::String(v) => {
                    map.string_map.insert(k, v);
                }
                ConfigValue::Bool(v) => {
                    map.bool_map.insert(k, v);
                }
                ConfigValue::Int(v) => {
                    map.int_map.insert(k, v);
                }
                ConfigValue::Float(v) => {
                    map.float_map.insert(k, v);
                }
            }
        }
        map
    }
}
