use thiserror::Error;

/// Errors raised by plugin implementations and by the data model they use.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// Free-form failure reported by a plugin
    #[error("{0}")]
    Message(String),

    /// Config lookup for a key that is not present
    #[error("config item {0} not found")]
    ConfigNotFound(String),

    /// Config lookup where the stored value has another type
    #[error("config item {key} is not a {expected}")]
    ConfigType { key: String, expected: &'static str },

    /// A config-policy rule was declared without a key
    #[error("Key cannot be Empty")]
    EmptyKey,

    /// A value that cannot cross the plugin boundary
    #[error("unsupported type {kind} given for {key}")]
    UnsupportedValue { key: String, kind: &'static str },

    /// The plugin panicked while serving a call
    #[error("plugin panicked: {0}")]
    Panicked(String),
}

impl PluginError {
    pub fn msg(message: impl Into<String>) -> Self {
        PluginError::Message(message.into())
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        PluginError::Message(message)
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        PluginError::Message(message.to_string())
    }
}

/// A specialized Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
