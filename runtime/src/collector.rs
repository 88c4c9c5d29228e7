use crate::plugin::Collector;
use crate::proxy::{PluginProxy, SessionState, guarded, hard_failure};
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::collector_server::Collector as CollectorService;
use snap_plugin_types::{Config, Metric};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

/// Serves a [`Collector`]. Plugin errors fail the call.
pub struct CollectorProxy {
    base: PluginProxy<dyn Collector>,
}

impl CollectorProxy {
    pub fn new(plugin: Arc<dyn Collector>, state: Arc<SessionState>) -> Self {
        Self {
            base: PluginProxy::new(plugin, state),
        }
    }
}

pub(crate) fn metrics_reply(metrics: Vec<Metric>) -> rpc::MetricsReply {
    rpc::MetricsReply {
        metrics: metrics.into_iter().map(rpc::Metric::from).collect(),
        error: String::new(),
    }
}

pub(crate) fn from_wire(metrics: Vec<rpc::Metric>) -> Vec<Metric> {
    metrics.into_iter().map(Metric::from).collect()
}

#[tonic::async_trait]
impl CollectorService for CollectorProxy {
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

    async fn collect_metrics(
        &self,
        request: Request<rpc::MetricsArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        let requested = from_wire(request.into_inner().metrics);
        debug!("CollectMetrics called for {} metric types", requested.len());

        match guarded(self.base.plugin().collect_metrics(requested)).await {
            Ok(metrics) => Ok(Response::new(metrics_reply(metrics))),
            Err(e) => {
                warn!("CollectMetrics failed: {}", e);
                Err(hard_failure(e))
            }
        }
    }

    async fn get_metric_types(
        &self,
        request: Request<rpc::GetMetricTypesArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        let config = Config::from(request.into_inner().config);

        match guarded(self.base.plugin().get_metric_types(config)).await {
            Ok(metrics) => Ok(Response::new(metrics_reply(metrics))),
            Err(e) => {
                warn!("GetMetricTypes failed: {}", e);
                Err(hard_failure(e))
            }
        }
    }
}
