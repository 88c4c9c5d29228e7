use crate::collector::{from_wire, metrics_reply};
use crate::plugin::Processor;
use crate::proxy::{PluginProxy, SessionState, guarded};
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::processor_server::Processor as ProcessorService;
use snap_plugin_types::Config;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

/// Serves a [`Processor`]. Plugin errors are reported in
/// `MetricsReply::error`.
pub struct ProcessorProxy {
    base: PluginProxy<dyn Processor>,
}

impl ProcessorProxy {
    pub fn new(plugin: Arc<dyn Processor>, state: Arc<SessionState>) -> Self {
        Self {
            base: PluginProxy::new(plugin, state),
        }
    }
}

#[tonic::async_trait]
impl ProcessorService for ProcessorProxy {
    async fn ping(&self, request: Request<rpc::Empty>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.ping(request)
    }

    async fn kill(&self, request: Request<rpc::KillArg>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.kill(request)
    }

    async fn get_config_policy(
        &self,
        request: Request<rpc::Empty>,
    ) -> Result<Response<rpc::GetConfigPolicyReply>, Status> {
        self.base.get_config_policy(request).await
    }

    async fn process(
        &self,
        request: Request<rpc::PubProcArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        let arg = request.into_inner();
        let metrics = from_wire(arg.metrics);
        let config = Config::from(arg.config);

        let reply = match guarded(self.base.plugin().process(metrics, config)).await {
            Ok(processed) => metrics_reply(processed),
            Err(e) => {
                warn!("Process failed: {}", e);
                rpc::MetricsReply {
                    metrics: Vec::new(),
                    error: e.to_string(),
                }
            }
        };
        Ok(Response::new(reply))
    }
}
