use crate::collector::from_wire;
use crate::plugin::Publisher;
use crate::proxy::{PluginProxy, SessionState, guarded};
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::publisher_server::Publisher as PublisherService;
use snap_plugin_types::Config;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

/// Serves a [`Publisher`]. Plugin errors are reported in `ErrReply::error`.
pub struct PublisherProxy {
    base: PluginProxy<dyn Publisher>,
}

impl PublisherProxy {
    pub fn new(plugin: Arc<dyn Publisher>, state: Arc<SessionState>) -> Self {
        Self {
            base: PluginProxy::new(plugin, state),
        }
    }
}

#[tonic::async_trait]
impl PublisherService for PublisherProxy {
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

    async fn publish(
        &self,
        request: Request<rpc::PubProcArg>,
    ) -> Result<Response<rpc::ErrReply>, Status> {
        let arg = request.into_inner();
        let metrics = from_wire(arg.metrics);
        let config = Config::from(arg.config);

        let error = match guarded(self.base.plugin().publish(metrics, config)).await {
            Ok(()) => String::new(),
            Err(e) => {
                warn!("Publish failed: {}", e);
                e.to_string()
            }
        };
        Ok(Response::new(rpc::ErrReply { error }))
    }
}
