use crate::meta::{PluginType, RpcType};
use async_trait::async_trait;
use snap_plugin_error::Result;
use snap_plugin_types::{Config, ConfigPolicy, Metric};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Behaviour every plugin kind shares.
///
/// A single instance serves all calls; it may be invoked concurrently up to
/// the concurrency count declared in its meta.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Config the plugin expects, per metric namespace.
    async fn get_config_policy(&self) -> Result<ConfigPolicy>;
}

#[async_trait]
pub trait Collector: Plugin {
    /// Metric types this plugin can collect, given the task config.
    async fn get_metric_types(&self, config: Config) -> Result<Vec<Metric>>;

    /// Collect values for the requested metric types.
    async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>>;
}

#[async_trait]
pub trait Processor: Plugin {
    async fn process(&self, metrics: Vec<Metric>, config: Config) -> Result<Vec<Metric>>;
}

#[async_trait]
pub trait Publisher: Plugin {
    async fn publish(&self, metrics: Vec<Metric>, config: Config) -> Result<()>;
}

/// Channels handed to a [`StreamCollector`] when a stream opens.
#[derive(Debug)]
pub struct StreamChannels {
    /// Metric types the host asks for; may deliver many times.
    pub requests: mpsc::Receiver<Vec<Metric>>,
    /// Batches of collected metrics.
    pub metrics: mpsc::Sender<Vec<Metric>>,
    /// Errors reported to the host without ending the stream.
    pub errors: mpsc::Sender<String>,
}

/// A collector that pushes metrics on its own schedule.
#[async_trait]
pub trait StreamCollector: Plugin {
    /// Start streaming. Should spawn its work and return; an error ends the
    /// stream before it begins. Dropping the `metrics` sender ends delivery.
    async fn stream_metrics(&self, channels: StreamChannels) -> Result<()>;

    async fn get_metric_types(&self, config: Config) -> Result<Vec<Metric>>;
}

/// A plugin implementation together with its kind.
#[derive(Clone)]
pub enum PluginInstance {
    Collector(Arc<dyn Collector>),
    StreamCollector(Arc<dyn StreamCollector>),
    Processor(Arc<dyn Processor>),
    Publisher(Arc<dyn Publisher>),
}

impl PluginInstance {
    pub fn collector(plugin: impl Collector) -> Self {
        PluginInstance::Collector(Arc::new(plugin))
    }

    pub fn stream_collector(plugin: impl StreamCollector) -> Self {
        PluginInstance::StreamCollector(Arc::new(plugin))
    }

    pub fn processor(plugin: impl Processor) -> Self {
        PluginInstance::Processor(Arc::new(plugin))
    }

    pub fn publisher(plugin: impl Publisher) -> Self {
        PluginInstance::Publisher(Arc::new(plugin))
    }

    pub fn plugin_type(&self) -> PluginType {
        match self {
            PluginInstance::Collector(_) | PluginInstance::StreamCollector(_) => {
                PluginType::Collector
            }
            PluginInstance::Processor(_) => PluginType::Processor,
            PluginInstance::Publisher(_) => PluginType::Publisher,
        }
    }

    pub fn rpc_type(&self) -> RpcType {
        match self {
            PluginInstance::StreamCollector(_) => RpcType::GrpcStream,
            _ => RpcType::Grpc,
        }
    }

    pub(crate) async fn get_config_policy(&self) -> Result<ConfigPolicy> {
        match self {
            PluginInstance::Collector(p) => p.get_config_policy().await,
            PluginInstance::StreamCollector(p) => p.get_config_policy().await,
            PluginInstance::Processor(p) => p.get_config_policy().await,
            PluginInstance::Publisher(p) => p.get_config_policy().await,
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            PluginInstance::Collector(_) => "Collector",
            PluginInstance::StreamCollector(_) => "StreamCollector",
            PluginInstance::Processor(_) => "Processor",
            PluginInstance::Publisher(_) => "Publisher",
        };
        f.debug_tuple("PluginInstance").field(&kind).finish()
    }
}
