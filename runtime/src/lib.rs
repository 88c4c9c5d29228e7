//! Snap Plugin Runtime
//!
//! This crate turns a plugin implementation into a process the Snap host can
//! launch. The process prints a single preamble line telling the host where
//! its gRPC server listens, then serves calls until the host kills it or
//! stops pinging it. Started without runtime arguments it instead runs the
//! plugin locally and prints diagnostics.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use snap_plugin_runtime::{Collector, Plugin, start_collector};
//! use snap_plugin_types::{Config, ConfigPolicy, Metric, Namespace, Result};
//!
//! struct Uptime;
//!
//! #[async_trait]
//! impl Plugin for Uptime {
//!     async fn get_config_policy(&self) -> Result<ConfigPolicy> {
//!         Ok(ConfigPolicy::new())
//!     }
//! }
//!
//! #[async_trait]
//! impl Collector for Uptime {
//!     async fn get_metric_types(&self, _config: Config) -> Result<Vec<Metric>> {
//!         Ok(vec![Metric::new(Namespace::new(&["example", "uptime"]))])
//!     }
//!
//!     async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
//!         Ok(metrics.into_iter().map(|m| m.with_data(42u64)).collect())
//!     }
//! }
//!
//! fn main() {
//!     std::process::exit(start_collector(Uptime, "uptime", 1, &[]));
//! }
//! ```

mod args;
mod collector;
pub mod diagnostics;
mod error;
mod io;
pub mod logging;
mod meta;
mod plugin;
mod processor;
mod proxy;
mod publisher;
mod runner;
mod session;
mod stream;
mod tls;

pub use args::{DEFAULT_PING_TIMEOUT, Invocation, Mode, RuntimeArgs};
pub use collector::CollectorProxy;
pub use error::{Result, RuntimeError};
pub use io::{ChannelIo, ProcessIo, StdIo};
pub use meta::{Meta, MetaOpt, PluginType, RoutingStrategy, RpcType};
pub use plugin::{
    Collector, Plugin, PluginInstance, Processor, Publisher, StreamChannels, StreamCollector,
};
pub use processor::ProcessorProxy;
pub use proxy::{HaltReason, PluginProxy, SessionState};
pub use publisher::PublisherProxy;
pub use runner::{
    PluginRunner, exit_code, start_collector, start_processor, start_publisher,
    start_stream_collector,
};
pub use session::{Preamble, Session};
pub use stream::{
    DEFAULT_MAX_COLLECT_DURATION, DEFAULT_MAX_METRICS_BUFFER, FlowSettings, StreamCollectorProxy,
};
pub use tls::{Credentials, RustlsSetup, TlsMaterial, TlsSetup, load_root_store};

