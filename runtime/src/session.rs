use crate::args::RuntimeArgs;
use crate::collector::CollectorProxy;
use crate::io::ProcessIo;
use crate::meta::{Meta, MetaOpt, PluginType};
use crate::plugin::PluginInstance;
use crate::processor::ProcessorProxy;
use crate::proxy::SessionState;
use crate::publisher::PublisherProxy;
use crate::stream::StreamCollectorProxy;
use crate::tls::{Credentials, TlsSetup, tls_incoming};
use crate::{Result, RuntimeError};
use serde::Serialize;
use snap_plugin_proto::rpc::collector_server::CollectorServer;
use snap_plugin_proto::rpc::processor_server::ProcessorServer;
use snap_plugin_proto::rpc::publisher_server::PublisherServer;
use snap_plugin_proto::rpc::stream_collector_server::StreamCollectorServer;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::{debug, error, info, warn};

/// How long in-flight calls get to finish once the session halts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The single line announcing the plugin to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Preamble<'a> {
    pub meta: &'a Meta,
    pub listen_address: String,
    pub pprof_address: String,
    #[serde(rename = "Type")]
    pub kind: PluginType,
    pub state: i32,
    pub error_message: String,
}

/// Meta for `instance`: defaults, then `opts`, then the RPC type its kind
/// requires.
pub(crate) fn plugin_meta(
    instance: &PluginInstance,
    name: &str,
    version: i32,
    opts: &[MetaOpt],
) -> Meta {
    let mut opts = opts.to_vec();
    opts.push(MetaOpt::RpcType(instance.rpc_type()));
    Meta::new(instance.plugin_type(), name, version, &opts)
}

fn routes(instance: &PluginInstance, state: &Arc<SessionState>) -> Routes {
    let state = Arc::clone(state);
    match instance {
        PluginInstance::Collector(p) => {
            Routes::new(CollectorServer::new(CollectorProxy::new(Arc::clone(p), state)))
        }
        PluginInstance::StreamCollector(p) => Routes::new(StreamCollectorServer::new(
            StreamCollectorProxy::new(Arc::clone(p), state),
        )),
        PluginInstance::Processor(p) => {
            Routes::new(ProcessorServer::new(ProcessorProxy::new(Arc::clone(p), state)))
        }
        PluginInstance::Publisher(p) => {
            Routes::new(PublisherServer::new(PublisherProxy::new(Arc::clone(p), state)))
        }
    }
}

/// A plugin ready to be announced and served.
pub struct Session {
    meta: Meta,
    args: RuntimeArgs,
    state: Arc<SessionState>,
    routes: Routes,
    credentials: Credentials,
    io: Arc<dyn ProcessIo>,
}

impl Session {
    /// Build the server for `instance`.
    ///
    /// Fails on inconsistent TLS arguments or unusable TLS material; nothing
    /// is bound or printed yet.
    pub fn build(
        instance: &PluginInstance,
        name: &str,
        version: i32,
        opts: &[MetaOpt],
        args: &RuntimeArgs,
        tls: &dyn TlsSetup,
        io: Arc<dyn ProcessIo>,
    ) -> Result<Self> {
        let meta = plugin_meta(instance, name, version, opts).with_security(args);
        let material = args.tls_material()?;
        let credentials = tls.make_credentials(material.as_ref())?;

        let state = Arc::new(SessionState::new(args.ping_timeout_duration));
        let routes = routes(instance, &state);

        Ok(Self {
            meta,
            args: args.clone(),
            state,
            routes,
            credentials,
            io,
        })
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    fn preamble_line(&self, listen_address: SocketAddr) -> Result<String> {
        let preamble = Preamble {
            meta: &self.meta,
            listen_address: listen_address.to_string(),
            pprof_address: "0".to_string(),
            kind: self.meta.kind,
            state: 0,
            error_message: String::new(),
        };
        serde_json::to_string(&preamble).map_err(RuntimeError::Preamble)
    }

    /// Bind a loopback listener, start serving, print the preamble and block
    /// until the session halts.
    pub async fn serve(self) -> Result<()> {
        let port = self.args.port()?;
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let addr = listener.local_addr()?;
        let line = self.preamble_line(addr)?;

        if self.args.pprof {
            warn!("Profiling endpoint requested but not available; reporting PprofAddress 0");
        }

        let halt = self.state.halt_token();
        let shutdown = {
            let halt = halt.clone();
            async move { halt.cancelled().await }
        };

        let mut builder = Server::builder();
        let router = builder.add_routes(self.routes);
        let mut server = match self.credentials {
            Credentials::Insecure => tokio::spawn(
                router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown),
            ),
            Credentials::Tls(config) => tokio::spawn(router.serve_with_incoming_shutdown(
                tls_incoming(listener, config, halt.clone()),
                shutdown,
            )),
        };
        info!("{} {} listening on {}", self.meta.kind, self.meta.name, addr);

        self.io.print_out(&line);
        let heartbeat = self.state.spawn_heartbeat();

        tokio::select! {
            _ = self.state.halted() => {}
            result = &mut server => {
                halt.cancel();
                heartbeat.abort();
                return match result {
                    Ok(Ok(())) => Err(RuntimeError::Io(std::io::Error::other(
                        "gRPC server stopped before the plugin halted",
                    ))),
                    Ok(Err(e)) => {
                        error!("gRPC server failed: {}", e);
                        Err(e.into())
                    }
                    Err(e) => Err(RuntimeError::Io(std::io::Error::other(e))),
                };
            }
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => debug!("gRPC server stopped"),
            Ok(Ok(Err(e))) => warn!("gRPC server stopped with error: {}", e),
            Ok(Err(e)) => warn!("gRPC server task failed: {}", e),
            Err(_) => {
                warn!("gRPC server did not stop in time, aborting it");
                server.abort();
            }
        }
        if let Err(e) = heartbeat.await {
            warn!("Heartbeat watcher failed: {}", e);
        }

        info!("Plugin stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ChannelIo;
    use crate::plugin::{Plugin, Publisher};
    use crate::proxy::HaltReason;
    use crate::tls::{RustlsSetup, TlsMaterial};
    use async_trait::async_trait;
    use snap_plugin_error::Result as PluginResult;
    use snap_plugin_types::{Config, ConfigPolicy, Metric};

    struct Null;

    #[async_trait]
    impl Plugin for Null {
        async fn get_config_policy(&self) -> PluginResult<ConfigPolicy> {
            Ok(ConfigPolicy::new())
        }
    }

    #[async_trait]
    impl Publisher for Null {
        async fn publish(&self, _metrics: Vec<Metric>, _config: Config) -> PluginResult<()> {
            Ok(())
        }
    }

    /// Never reached unless TLS arguments are valid.
    struct FailingTls;

    impl TlsSetup for FailingTls {
        fn make_credentials(&self, material: Option<&TlsMaterial>) -> Result<Credentials> {
            match material {
                Some(_) => Err(RuntimeError::Tls("refused".into())),
                None => Ok(Credentials::Insecure),
            }
        }
    }

    fn build(args: &RuntimeArgs, tls: &dyn TlsSetup) -> Result<(Session, tokio::sync::mpsc::UnboundedReceiver<String>)> {
        let (io, rx) = ChannelIo::new(["plugin"]);
        let session = Session::build(
            &PluginInstance::publisher(Null),
            "null",
            4,
            &[MetaOpt::Exclusive(true)],
            args,
            tls,
            Arc::new(io),
        )?;
        Ok((session, rx))
    }

    #[test]
    fn build_rejects_half_tls_config() {
        let args = RuntimeArgs {
            tls_enabled: true,
            key_path: "server.key".into(),
            ..Default::default()
        };
        let err = build(&args, &FailingTls).err().unwrap();
        assert!(matches!(err, RuntimeError::Args(_)));
    }

    #[test]
    fn build_uses_injected_tls_setup() {
        let args = RuntimeArgs {
            tls_enabled: true,
            cert_path: "server.crt".into(),
            key_path: "server.key".into(),
            ..Default::default()
        };
        let err = build(&args, &FailingTls).err().unwrap();
        assert_eq!(err.to_string(), "unable to setup credentials for plugin - refused");
    }

    #[test]
    fn stream_collector_meta_forces_stream_rpc() {
        struct Stream;

        #[async_trait]
        impl Plugin for Stream {
            async fn get_config_policy(&self) -> PluginResult<ConfigPolicy> {
                Ok(ConfigPolicy::new())
            }
        }

        #[async_trait]
        impl crate::plugin::StreamCollector for Stream {
            async fn stream_metrics(&self, _channels: crate::plugin::StreamChannels) -> PluginResult<()> {
                Ok(())
            }

            async fn get_metric_types(&self, _config: Config) -> PluginResult<Vec<Metric>> {
                Ok(vec![])
            }
        }

        let meta = plugin_meta(
            &PluginInstance::stream_collector(Stream),
            "stream",
            1,
            &[MetaOpt::RpcType(crate::meta::RpcType::Grpc)],
        );
        assert_eq!(meta.rpc_type, crate::meta::RpcType::GrpcStream);
        assert_eq!(meta.kind, PluginType::Collector);
    }

    #[tokio::test]
    async fn serve_prints_preamble_then_stops_on_halt() {
        let (session, mut rx) = build(&RuntimeArgs::default(), &RustlsSetup).unwrap();
        let state = Arc::clone(session.state());
        let serving = tokio::spawn(session.serve());

        let line = rx.recv().await.unwrap();
        let preamble: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(preamble["Type"], 2);
        assert_eq!(preamble["State"], 0);
        assert_eq!(preamble["ErrorMessage"], "");
        assert_eq!(preamble["PprofAddress"], "0");
        assert_eq!(preamble["Meta"]["Name"], "null");
        assert_eq!(preamble["Meta"]["Exclusive"], true);

        let addr: SocketAddr = preamble["ListenAddress"].as_str().unwrap().parse().unwrap();
        assert!(addr.ip().is_loopback());
        // Bound before the line was printed.
        tokio::net::TcpStream::connect(addr).await.unwrap();

        state.halt(HaltReason::Killed("test".into()));
        serving.await.unwrap().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn explicit_port_is_used() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let args = RuntimeArgs {
            listen_port: port.to_string(),
            ..Default::default()
        };
        let (session, mut rx) = build(&args, &RustlsSetup).unwrap();
        let state = Arc::clone(session.state());
        let serving = tokio::spawn(session.serve());

        let preamble: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(preamble["ListenAddress"], format!("127.0.0.1:{}", port));

        state.halt(HaltReason::Killed("test".into()));
        serving.await.unwrap().unwrap();
    }
}
