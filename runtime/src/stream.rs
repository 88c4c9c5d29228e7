//! Stream collector service and the flow controller behind `StreamMetrics`.
//!
//! Each stream runs three tasks:
//! - metrics: batches plugin output into `CollectReply` frames, flushing
//!   when the buffer reaches `max_metrics_buffer` (or after every batch when
//!   that is 0) and when `max_collect_duration` elapses;
//! - errors: forwards plugin error strings as error frames;
//! - requests: applies control frames from the host and hands requested
//!   metric types to the plugin.
//!
//! All three end when the host goes away or the session halts.

use crate::collector::{from_wire, metrics_reply};
use crate::plugin::{StreamChannels, StreamCollector};
use crate::proxy::{PluginProxy, SessionState, guarded, hard_failure};
use futures::{Stream, StreamExt};
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::stream_collector_server::StreamCollector as StreamCollectorService;
use snap_plugin_types::{Config, Metric};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, warn};

pub const DEFAULT_MAX_COLLECT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_METRICS_BUFFER: u64 = 0;

const CHANNEL_CAPACITY: usize = 16;

type ReplySender = mpsc::Sender<Result<rpc::CollectReply, Status>>;

/// Flush triggers, shared by the streams of one proxy and updated live by
/// control frames.
#[derive(Debug)]
pub struct FlowSettings {
    max_collect_duration_ns: AtomicU64,
    max_metrics_buffer: AtomicU64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COLLECT_DURATION, DEFAULT_MAX_METRICS_BUFFER)
    }
}

impl FlowSettings {
    pub fn new(max_collect_duration: Duration, max_metrics_buffer: u64) -> Self {
        Self {
            max_collect_duration_ns: AtomicU64::new(duration_to_nanos(max_collect_duration)),
            max_metrics_buffer: AtomicU64::new(max_metrics_buffer),
        }
    }

    pub fn max_collect_duration(&self) -> Duration {
        Duration::from_nanos(self.max_collect_duration_ns.load(Ordering::Relaxed))
    }

    pub fn set_max_collect_duration(&self, duration: Duration) {
        self.max_collect_duration_ns
            .store(duration_to_nanos(duration), Ordering::Relaxed);
    }

    /// 0 means every batch is sent as soon as it arrives.
    pub fn max_metrics_buffer(&self) -> u64 {
        self.max_metrics_buffer.load(Ordering::Relaxed)
    }

    pub fn set_max_metrics_buffer(&self, max: u64) {
        self.max_metrics_buffer.store(max, Ordering::Relaxed);
    }

    /// Apply the positive settings of a control frame; zero means unchanged.
    pub fn apply(&self, arg: &rpc::CollectArg) {
        if arg.max_metrics_buffer > 0 {
            debug!("Setting max metrics buffer to {}", arg.max_metrics_buffer);
            self.set_max_metrics_buffer(arg.max_metrics_buffer as u64);
        }
        if arg.max_collect_duration > 0 {
            let duration = Duration::from_nanos(arg.max_collect_duration as u64);
            debug!(
                "Setting max collect duration to {}",
                humantime::format_duration(duration)
            );
            self.set_max_collect_duration(duration);
        }
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u128::from(u64::MAX)) as u64
}

/// Send the window as one frame. Returns false once the host is gone.
async fn flush(window: &mut Vec<Metric>, replies: &ReplySender) -> bool {
    let metrics = std::mem::take(window);
    debug!("Sending {} metrics", metrics.len());

    let reply = rpc::CollectReply {
        metrics_reply: Some(metrics_reply(metrics)),
        error: None,
    };
    if replies.send(Ok(reply)).await.is_err() {
        debug!("Stream closed, dropping metrics");
        return false;
    }
    true
}

pub(crate) async fn forward_metrics(
    settings: Arc<FlowSettings>,
    mut batches: mpsc::Receiver<Vec<Metric>>,
    replies: ReplySender,
    halt: CancellationToken,
) {
    let mut window: Vec<Metric> = Vec::new();
    let mut window_start = Instant::now();

    loop {
        let deadline = window_start + settings.max_collect_duration();

        tokio::select! {
            batch = batches.recv() => {
                let Some(batch) = batch else {
                    debug!("Plugin closed its metrics channel");
                    if !window.is_empty() {
                        flush(&mut window, &replies).await;
                    }
                    return;
                };

                let max = settings.max_metrics_buffer();
                for metric in batch {
                    window.push(metric);
                    if max > 0 && window.len() as u64 >= max {
                        if !flush(&mut window, &replies).await {
                            return;
                        }
                        window_start = Instant::now();
                    }
                }
                if max == 0 && !window.is_empty() {
                    if !flush(&mut window, &replies).await {
                        return;
                    }
                    window_start = Instant::now();
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                if window.is_empty() {
                    debug!("Collect duration elapsed with no metrics buffered");
                } else if !flush(&mut window, &replies).await {
                    return;
                }
                window_start = Instant::now();
            }
            _ = replies.closed() => {
                debug!("Host closed the metrics stream");
                return;
            }
            _ = halt.cancelled() => {
                if !window.is_empty() {
                    flush(&mut window, &replies).await;
                }
                return;
            }
        }
    }
}

pub(crate) async fn forward_errors(
    mut errors: mpsc::Receiver<String>,
    replies: ReplySender,
    halt: CancellationToken,
) {
    loop {
        let error = tokio::select! {
            error = errors.recv() => match error {
                Some(error) => error,
                None => return,
            },
            _ = replies.closed() => return,
            _ = halt.cancelled() => return,
        };

        warn!("Plugin reported stream error: {}", error);
        let reply = rpc::CollectReply {
            metrics_reply: None,
            error: Some(rpc::ErrReply { error }),
        };
        if replies.send(Ok(reply)).await.is_err() {
            return;
        }
    }
}

pub(crate) async fn receive_requests<S>(
    settings: Arc<FlowSettings>,
    mut inbound: S,
    requests: mpsc::Sender<Vec<Metric>>,
    halt: CancellationToken,
) where
    S: Stream<Item = Result<rpc::CollectArg, Status>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = inbound.next() => frame,
            _ = halt.cancelled() => break,
        };

        match frame {
            Some(Ok(arg)) => {
                settings.apply(&arg);
                if let Some(metrics_arg) = arg.metrics_arg {
                    let requested = from_wire(metrics_arg.metrics);
                    debug!("Host requested {} metric types", requested.len());
                    if requests.send(requested).await.is_err() {
                        debug!("Plugin no longer reads metric requests");
                    }
                }
            }
            Some(Err(status)) => warn!("Failed to receive from metrics stream: {}", status),
            None => break,
        }
    }
    debug!("Metrics stream request loop stopped");
}

/// Serves a [`StreamCollector`].
pub struct StreamCollectorProxy {
    base: PluginProxy<dyn StreamCollector>,
    settings: Arc<FlowSettings>,
}

impl StreamCollectorProxy {
    pub fn new(plugin: Arc<dyn StreamCollector>, state: Arc<SessionState>) -> Self {
        Self {
            base: PluginProxy::new(plugin, state),
            settings: Arc::new(FlowSettings::default()),
        }
    }

    pub fn settings(&self) -> &Arc<FlowSettings> {
        &self.settings
    }
}

#[tonic::async_trait]
impl StreamCollectorService for StreamCollectorProxy {
    type StreamMetricsStream = ReceiverStream<Result<rpc::CollectReply, Status>>;

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

    async fn stream_metrics(
        &self,
        request: Request<Streaming<rpc::CollectArg>>,
    ) -> Result<Response<Self::StreamMetricsStream>, Status> {
        let inbound = request.into_inner();

        let (requests_tx, requests_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (metrics_tx, metrics_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let channels = StreamChannels {
            requests: requests_rx,
            metrics: metrics_tx,
            errors: errors_tx,
        };

        if let Err(e) = guarded(self.base.plugin().stream_metrics(channels)).await {
            warn!("StreamMetrics failed to start: {}", e);
            return Err(hard_failure(e));
        }
        debug!("Metrics stream started");

        let halt = self.base.state().halt_token();
        let (replies_tx, replies_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(forward_metrics(
            Arc::clone(&self.settings),
            metrics_rx,
            replies_tx.clone(),
            halt.clone(),
        ));
        tokio::spawn(forward_errors(errors_rx, replies_tx, halt.clone()));
        tokio::spawn(receive_requests(
            Arc::clone(&self.settings),
            inbound,
            requests_tx,
            halt,
        ));

        Ok(Response::new(ReceiverStream::new(replies_rx)))
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

    /// Accepted and ignored.
    async fn set_config(
        &self,
        _request: Request<rpc::ConfigMap>,
    ) -> Result<Response<rpc::ErrReply>, Status> {
        debug!("SetConfig called");
        Ok(Response::new(rpc::ErrReply::default()))
    }
}
