use crate::meta::PluginType;
use crate::tls::TlsMaterial;
use crate::{Result, RuntimeError};
use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Deserializer};
use snap_plugin_types::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Default time the host may stay silent before the plugin halts itself.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(1500);

/// Runtime parameters handed over by the host as a single JSON argument.
///
/// Built once at startup and passed by reference afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuntimeArgs {
    /// logrus numbering: 0 panic .. 5 debug, 6 and above trace.
    pub log_level: u8,
    /// Integer nanoseconds or a duration string such as `"1500ms"`.
    #[serde(deserialize_with = "deserialize_duration")]
    pub ping_timeout_duration: Duration,
    #[serde(deserialize_with = "deserialize_port")]
    pub listen_port: String,
    pub pprof: bool,
    #[serde(rename = "TLSEnabled")]
    pub tls_enabled: bool,
    pub cert_path: String,
    pub key_path: String,
    /// Platform path list of CA files or directories.
    pub root_cert_paths: String,
}

impl Default for RuntimeArgs {
    fn default() -> Self {
        Self {
            log_level: 2,
            ping_timeout_duration: DEFAULT_PING_TIMEOUT,
            listen_port: "0".to_string(),
            pprof: false,
            tls_enabled: false,
            cert_path: String::new(),
            key_path: String::new(),
            root_cert_paths: String::new(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nanos(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Nanos(n) => Ok(Duration::from_nanos(n.max(0) as u64)),
        Raw::Text(s) => humantime::parse_duration(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

impl RuntimeArgs {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(RuntimeError::Json)
    }

    /// Port to listen on; empty means ephemeral.
    pub fn port(&self) -> Result<u16> {
        let port = self.listen_port.trim();
        if port.is_empty() {
            return Ok(0);
        }
        port.parse()
            .map_err(|_| RuntimeError::Args(format!("invalid ListenPort: {:?}", self.listen_port)))
    }

    /// Certificate material to serve with, or `None` for an insecure server.
    ///
    /// Fails when TLS is requested without both paths, or when paths are
    /// given while TLS is off.
    pub fn tls_material(&self) -> Result<Option<TlsMaterial>> {
        if !self.tls_enabled {
            if !self.cert_path.is_empty() || !self.key_path.is_empty() {
                return Err(RuntimeError::Args(
                    "excessive arguments given - CertPath and KeyPath are unused with TLS not enabled"
                        .to_string(),
                ));
            }
            return Ok(None);
        }

        if self.cert_path.is_empty() || self.key_path.is_empty() {
            return Err(RuntimeError::Args(
                "failed to enable TLS for plugin - need both CertPath and KeyPath".to_string(),
            ));
        }

        Ok(Some(TlsMaterial {
            cert_path: PathBuf::from(&self.cert_path),
            key_path: PathBuf::from(&self.key_path),
            root_cert_paths: std::env::split_paths(&self.root_cert_paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }))
    }
}

#[derive(Debug, Parser)]
struct Cli {
    /// Runtime arguments as JSON; without them the plugin runs diagnostics
    #[arg(value_name = "ARGS")]
    args: Option<String>,

    /// Config given to the plugin in diagnostics mode, as JSON
    #[arg(long)]
    config: Option<String>,

    /// Port the gRPC server listens on
    #[arg(long)]
    port: Option<String>,

    /// Time the host may stay silent before the plugin stops, e.g. 1500ms
    #[arg(long, value_parser = humantime::parse_duration)]
    ping_timeout: Option<Duration>,

    /// Ask for a profiling endpoint
    #[arg(long)]
    pprof: bool,

    /// Serve over TLS
    #[arg(long)]
    tls: bool,

    /// Server certificate (PEM)
    #[arg(long)]
    cert_path: Option<String>,

    /// Server private key (PEM)
    #[arg(long)]
    key_path: Option<String>,

    /// CA certificates used to verify clients, as a path list
    #[arg(long)]
    root_cert_paths: Option<String>,
}

impl Cli {
    fn apply(&self, mut args: RuntimeArgs) -> RuntimeArgs {
        if let Some(port) = &self.port {
            args.listen_port = port.clone();
        }
        if let Some(timeout) = self.ping_timeout {
            args.ping_timeout_duration = timeout;
        }
        if self.pprof {
            args.pprof = true;
        }
        if self.tls {
            args.tls_enabled = true;
        }
        if let Some(path) = &self.cert_path {
            args.cert_path = path.clone();
        }
        if let Some(path) = &self.key_path {
            args.key_path = path.clone();
        }
        if let Some(paths) = &self.root_cert_paths {
            args.root_cert_paths = paths.clone();
        }
        args
    }
}

/// What the process was started to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Print the handshake and serve the host.
    Serve,
    /// Run the plugin locally with the given config and print the results.
    Diagnostics(Config),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub args: RuntimeArgs,
    pub mode: Mode,
}

impl Invocation {
    /// Parse a full command line (program name first).
    pub fn parse(argv: Vec<String>, name: &str, version: i32, kind: PluginType) -> Result<Self> {
        let command = Cli::command()
            .name(name.to_string())
            .version(version.to_string())
            .about(format!("A Snap {} plugin", kind));
        let matches = command.try_get_matches_from(argv)?;
        let cli = Cli::from_arg_matches(&matches)?;

        match &cli.args {
            Some(json) => {
                let args = cli.apply(RuntimeArgs::from_json(json)?);
                Ok(Self {
                    args,
                    mode: Mode::Serve,
                })
            }
            None => {
                let config = match &cli.config {
                    Some(json) => parse_diagnostics_config(json)?,
                    None => Config::default(),
                };
                Ok(Self {
                    args: cli.apply(RuntimeArgs::default()),
                    mode: Mode::Diagnostics(config),
                })
            }
        }
    }
}

fn parse_diagnostics_config(json: &str) -> Result<Config> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        RuntimeError::Diagnostics(format!(
            "! Error when parsing config. Please ensure your config is valid. \n {}",
            e
        ))
    })?;
    Ok(Config::from_json(&value)?)
}
