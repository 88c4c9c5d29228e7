use snap_plugin_error::PluginError;
use std::fmt;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that stop the runtime before or while serving a plugin
#[derive(Debug)]
pub enum RuntimeError {
    /// Inconsistent or invalid runtime arguments
    Args(String),
    /// Malformed runtime JSON
    Json(serde_json::Error),
    /// Command line parsing (also carries `--help` / `--version` output)
    Cli(clap::Error),
    /// Certificates or keys could not be loaded
    Tls(String),
    /// gRPC transport error
    Transport(tonic::transport::Error),
    /// I/O error
    Io(std::io::Error),
    /// The preamble could not be encoded
    Preamble(serde_json::Error),
    /// Error returned by the plugin itself
    Plugin(PluginError),
    /// A diagnostics stage failed
    Diagnostics(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Args(e) => write!(f, "{}", e),
            RuntimeError::Json(e) => write!(f, "invalid runtime arguments: {}", e),
            RuntimeError::Cli(e) => write!(f, "{}", e),
            RuntimeError::Tls(e) => write!(f, "unable to setup credentials for plugin - {}", e),
            RuntimeError::Transport(e) => write!(f, "Transport error: {}", e),
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
            RuntimeError::Preamble(e) => write!(f, "unable to encode preamble: {}", e),
            RuntimeError::Plugin(e) => write!(f, "Plugin error: {}", e),
            RuntimeError::Diagnostics(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Json(e) | RuntimeError::Preamble(e) => Some(e),
            RuntimeError::Cli(e) => Some(e),
            RuntimeError::Transport(e) => Some(e),
            RuntimeError::Io(e) => Some(e),
            RuntimeError::Plugin(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io(err)
    }
}

impl From<tonic::transport::Error> for RuntimeError {
    fn from(err: tonic::transport::Error) -> Self {
        RuntimeError::Transport(err)
    }
}

impl From<clap::Error> for RuntimeError {
    fn from(err: clap::Error) -> Self {
        RuntimeError::Cli(err)
    }
}

impl From<PluginError> for RuntimeError {
    fn from(err: PluginError) -> Self {
        RuntimeError::Plugin(err)
    }
}

impl From<rustls::Error> for RuntimeError {
    fn from(err: rustls::Error) -> Self {
        RuntimeError::Tls(err.to_string())
    }
}
