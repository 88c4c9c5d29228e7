mod common;

use async_trait::async_trait;
use common::{Burst, Mock, launch};
use snap_plugin_error::Result;
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::collector_client::CollectorClient;
use snap_plugin_proto::rpc::processor_client::ProcessorClient;
use snap_plugin_proto::rpc::publisher_client::PublisherClient;
use snap_plugin_proto::rpc::stream_collector_client::StreamCollectorClient;
use snap_plugin_runtime::{
    ChannelIo, Collector, HaltReason, Plugin, PluginInstance, RuntimeArgs, RustlsSetup, Session,
};
use snap_plugin_types::{Config, ConfigPolicy, Metric, Namespace};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

const NO_PING_TIMEOUT: &str = r#"{"PingTimeoutDuration": 0}"#;

fn wire(metric: Metric) -> rpc::Metric {
    metric.into()
}

#[tokio::test]
async fn collector_serves_types_and_collections() {
    let plugin = launch(PluginInstance::collector(Mock), NO_PING_TIMEOUT).await;
    assert_eq!(plugin.preamble["Meta"]["RPCType"], 2);
    assert_eq!(plugin.preamble["Type"], 0);

    let mut client = CollectorClient::connect(format!("http://{}", plugin.addr))
        .await
        .unwrap();
    client.ping(rpc::Empty {}).await.unwrap();

    let types = client
        .get_metric_types(rpc::GetMetricTypesArg {
            config: Some(rpc::ConfigMap::default()),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(types.metrics.len(), 2);
    assert!(types.error.is_empty());

    let collected = client
        .collect_metrics(rpc::MetricsArg {
            metrics: types.metrics,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(collected.metrics.len(), 2);
    assert!(collected.metrics.iter().all(|m| m.data.is_some()));
    assert!(collected.metrics.iter().all(|m| m.timestamp.is_some()));

    let failing = Metric::new(Namespace::new(&["intel", "mock", "foo"]))
        .with_config(Config::new().with("fail", true));
    let status = client
        .collect_metrics(rpc::MetricsArg {
            metrics: vec![wire(failing)],
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unknown);
    assert_eq!(status.message(), "collection failed");

    client
        .kill(rpc::KillArg {
            reason: "done".into(),
        })
        .await
        .unwrap();
    timeout(Duration::from_secs(5), plugin.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn policy_reports_required_string_without_default() {
    let plugin = launch(PluginInstance::collector(Mock), NO_PING_TIMEOUT).await;
    let mut client = CollectorClient::connect(format!("http://{}", plugin.addr))
        .await
        .unwrap();

    let policy = client
        .get_config_policy(rpc::Empty {})
        .await
        .unwrap()
        .into_inner();
    assert!(policy.error.is_empty());
    let rule = &policy.string_policy["intel.mock"].rules["name"];
    assert!(rule.required);
    assert!(!rule.has_default);

    client.kill(rpc::KillArg::default()).await.unwrap();
    plugin.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn processor_and_publisher_report_errors_in_band() {
    let failing: Option<rpc::ConfigMap> = Some(Config::new().with("fail", true).into());

    let processor = launch(PluginInstance::processor(Mock), NO_PING_TIMEOUT).await;
    let mut client = ProcessorClient::connect(format!("http://{}", processor.addr))
        .await
        .unwrap();
    let ok = client
        .process(rpc::PubProcArg {
            metrics: vec![wire(Metric::new(Namespace::new(&["a", "b"])))],
            config: None,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(ok.metrics.len(), 1);
    assert!(ok.error.is_empty());

    let reply = client
        .process(rpc::PubProcArg {
            metrics: vec![],
            config: failing.clone(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.error, "processing failed");
    client.kill(rpc::KillArg::default()).await.unwrap();
    processor.task.await.unwrap().unwrap();

    let publisher = launch(PluginInstance::publisher(Mock), NO_PING_TIMEOUT).await;
    assert_eq!(publisher.preamble["Type"], 2);
    let mut client = PublisherClient::connect(format!("http://{}", publisher.addr))
        .await
        .unwrap();
    let reply = client
        .publish(rpc::PubProcArg {
            metrics: vec![],
            config: failing,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.error, "publishing failed");
    client.kill(rpc::KillArg::default()).await.unwrap();
    publisher.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn kill_without_any_ping_stops_serving() {
    let plugin = launch(PluginInstance::publisher(Mock), NO_PING_TIMEOUT).await;
    let mut client = PublisherClient::connect(format!("http://{}", plugin.addr))
        .await
        .unwrap();

    let reply = client
        .kill(rpc::KillArg {
            reason: "host shutting down".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.error.is_empty());

    timeout(Duration::from_secs(5), plugin.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// Takes longer to collect than the host waits between pings.
struct Slow;

#[async_trait]
impl Plugin for Slow {
    async fn get_config_policy(&self) -> Result<ConfigPolicy> {
        Ok(ConfigPolicy::new())
    }
}

#[async_trait]
impl Collector for Slow {
    async fn get_metric_types(&self, _config: Config) -> Result<Vec<Metric>> {
        Ok(vec![Metric::new(Namespace::new(&["slow", "value"]))])
    }

    async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok(metrics.into_iter().map(|m| m.with_data(5i64)).collect())
    }
}

#[tokio::test]
async fn missed_heartbeat_halts_the_session() {
    let args = RuntimeArgs {
        ping_timeout_duration: Duration::from_millis(50),
        ..Default::default()
    };
    let (io, mut rx) = ChannelIo::new(["plugin"]);
    let session = Session::build(
        &PluginInstance::collector(Slow),
        "slow",
        1,
        &[],
        &args,
        &RustlsSetup,
        Arc::new(io),
    )
    .unwrap();
    let state = Arc::clone(session.state());
    let serving = tokio::spawn(session.serve());

    let preamble: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    let started = Instant::now();
    let addr = preamble["ListenAddress"].as_str().unwrap().to_string();

    // Issued before the timeout expires, answered after the halt.
    let mut client = CollectorClient::connect(format!("http://{}", addr))
        .await
        .unwrap();
    let collected = client
        .collect_metrics(rpc::MetricsArg {
            metrics: vec![wire(Metric::new(Namespace::new(&["slow", "value"])))],
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(collected.metrics.len(), 1);
    assert!(collected.metrics[0].data.is_some());
    assert!(state.is_halted());

    timeout(Duration::from_secs(3), serving)
        .await
        .expect("session outlived its ping timeout")
        .unwrap()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(matches!(state.halt_reason(), Some(HaltReason::PingTimeout(_))));
    assert!(CollectorClient::connect(format!("http://{}", addr)).await.is_err());
}

#[tokio::test]
async fn stream_buffers_until_collect_duration_elapses() {
    let plugin = launch(PluginInstance::stream_collector(Burst), NO_PING_TIMEOUT).await;
    assert_eq!(plugin.preamble["Meta"]["RPCType"], 3);

    let mut client = StreamCollectorClient::connect(format!("http://{}", plugin.addr))
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(4);
    tx.send(rpc::CollectArg {
        metrics_arg: Some(rpc::MetricsArg {
            metrics: vec![wire(Metric::new(Namespace::new(&["burst", "value"])))],
        }),
        max_collect_duration: Duration::from_millis(100).as_nanos() as i64,
        max_metrics_buffer: 10,
    })
    .await
    .unwrap();

    let mut inbound = client
        .stream_metrics(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    let frame = timeout(Duration::from_secs(2), inbound.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(frame.error.is_none());
    assert_eq!(frame.metrics_reply.unwrap().metrics.len(), 3);

    // Nothing buffered, so the next windows stay silent.
    assert!(
        timeout(Duration::from_millis(300), inbound.message())
            .await
            .is_err()
    );

    tx.send(rpc::CollectArg {
        metrics_arg: Some(rpc::MetricsArg { metrics: vec![] }),
        ..Default::default()
    })
    .await
    .unwrap();
    let frame = timeout(Duration::from_secs(2), inbound.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(frame.metrics_reply.is_none());
    assert_eq!(frame.error.unwrap().error, "nothing requested");

    client.kill(rpc::KillArg::default()).await.unwrap();
    timeout(Duration::from_secs(5), plugin.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
