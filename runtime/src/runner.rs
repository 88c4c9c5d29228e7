use crate::args::{Invocation, Mode};
use crate::io::{ProcessIo, StdIo};
use crate::meta::MetaOpt;
use crate::plugin::{Collector, PluginInstance, Processor, Publisher, StreamCollector};
use crate::session::{Session, plugin_meta};
use crate::tls::{RustlsSetup, TlsSetup};
use crate::{Result, RuntimeError, diagnostics, logging};
use std::sync::Arc;
use tracing::{error, info};

/// Drives a plugin from its command line to the end of the process.
pub struct PluginRunner {
    io: Arc<dyn ProcessIo>,
    tls: Arc<dyn TlsSetup>,
}

impl Default for PluginRunner {
    fn default() -> Self {
        Self {
            io: Arc::new(StdIo),
            tls: Arc::new(RustlsSetup),
        }
    }
}

impl PluginRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace process arguments and output.
    pub fn with_io(mut self, io: impl ProcessIo + 'static) -> Self {
        self.io = Arc::new(io);
        self
    }

    pub fn with_tls(mut self, tls: impl TlsSetup + 'static) -> Self {
        self.tls = Arc::new(tls);
        self
    }

    /// Serve the host, or run diagnostics when no runtime arguments were
    /// given.
    pub async fn run(
        &self,
        instance: PluginInstance,
        name: &str,
        version: i32,
        opts: &[MetaOpt],
    ) -> Result<()> {
        let invocation = match Invocation::parse(self.io.args(), name, version, instance.plugin_type()) {
            Ok(invocation) => invocation,
            Err(e) => {
                logging::init(2);
                return Err(e);
            }
        };
        logging::init(invocation.args.log_level);

        match invocation.mode {
            Mode::Serve => {
                info!("Starting {} plugin {} v{}", instance.plugin_type(), name, version);
                let session = Session::build(
                    &instance,
                    name,
                    version,
                    opts,
                    &invocation.args,
                    self.tls.as_ref(),
                    Arc::clone(&self.io),
                )?;
                session.serve().await
            }
            Mode::Diagnostics(config) => {
                let meta = plugin_meta(&instance, name, version, opts);
                diagnostics::run(&instance, &meta, config, self.io.as_ref()).await
            }
        }
    }
}

/// Process exit code for the outcome of [`PluginRunner::run`].
///
/// `--help` and `--version` are printed here and exit 0.
pub fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(RuntimeError::Cli(e)) => {
            let _ = e.print();
            e.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

fn start(instance: PluginInstance, name: &str, version: i32, opts: &[MetaOpt]) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            logging::init(2);
            error!("Failed to start tokio runtime: {}", e);
            return 1;
        }
    };

    exit_code(runtime.block_on(PluginRunner::new().run(instance, name, version, opts)))
}

/// Run `plugin` as a collector until the host stops it; returns the exit code.
pub fn start_collector(plugin: impl Collector, name: &str, version: i32, opts: &[MetaOpt]) -> i32 {
    start(PluginInstance::collector(plugin), name, version, opts)
}

pub fn start_stream_collector(
    plugin: impl StreamCollector,
    name: &str,
    version: i32,
    opts: &[MetaOpt],
) -> i32 {
    start(PluginInstance::stream_collector(plugin), name, version, opts)
}

pub fn start_processor(plugin: impl Processor, name: &str, version: i32, opts: &[MetaOpt]) -> i32 {
    start(PluginInstance::processor(plugin), name, version, opts)
}

pub fn start_publisher(plugin: impl Publisher, name: &str, version: i32, opts: &[MetaOpt]) -> i32 {
    start(PluginInstance::publisher(plugin), name, version, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ChannelIo;
    use crate::plugin::Plugin;
    use async_trait::async_trait;
    use snap_plugin_error::Result as PluginResult;
    use snap_plugin_types::{Config, ConfigPolicy, Metric};

    struct Discard;

    #[async_trait]
    impl Plugin for Discard {
        async fn get_config_policy(&self) -> PluginResult<ConfigPolicy> {
            Ok(ConfigPolicy::new())
        }
    }

    #[async_trait]
    impl Publisher for Discard {
        async fn publish(&self, _metrics: Vec<Metric>, _config: Config) -> PluginResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn no_arguments_runs_diagnostics() {
        let (io, mut rx) = ChannelIo::new(["plugin"]);
        let result = PluginRunner::new()
            .with_io(io)
            .run(PluginInstance::publisher(Discard), "drop", 1, &[])
            .await;
        assert_eq!(exit_code(result), 0);

        let first = rx.recv().await.unwrap();
        assert_eq!(first, "Runtime Details:");
    }

    #[tokio::test]
    async fn malformed_runtime_json_fails_before_serving() {
        let (io, mut rx) = ChannelIo::new(["plugin", "{\"ListenPort\":"]);
        let result = PluginRunner::new()
            .with_io(io)
            .run(PluginInstance::publisher(Discard), "drop", 1, &[])
            .await;

        assert!(matches!(result, Err(RuntimeError::Json(_))));
        assert_eq!(exit_code(result), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn help_exits_zero() {
        let err = Invocation::parse(
            vec!["plugin".into(), "--version".into()],
            "drop",
            1,
            crate::meta::PluginType::Publisher,
        )
        .unwrap_err();
        assert_eq!(exit_code(Err(err)), 0);
    }
}
