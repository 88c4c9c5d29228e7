mod common;

use common::{Mock, fixture, launch};
use snap_plugin_proto::rpc;
use snap_plugin_proto::rpc::collector_client::CollectorClient;
use snap_plugin_runtime::PluginInstance;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

fn tls_args() -> String {
    serde_json::json!({
        "PingTimeoutDuration": 0,
        "TLSEnabled": true,
        "CertPath": fixture("server.crt"),
        "KeyPath": fixture("server.key"),
        "RootCertPaths": fixture("ca.crt"),
    })
    .to_string()
}

fn client_tls(with_identity: bool) -> ClientTlsConfig {
    let ca = std::fs::read(fixture("ca.crt")).unwrap();
    let config = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca))
        .domain_name("localhost");
    if !with_identity {
        return config;
    }
    let cert = std::fs::read(fixture("client.crt")).unwrap();
    let key = std::fs::read(fixture("client.key")).unwrap();
    config.identity(Identity::from_pem(cert, key))
}

async fn connect(addr: &str, tls: ClientTlsConfig) -> Result<Channel, tonic::transport::Error> {
    Channel::from_shared(format!("https://{}", addr))
        .unwrap()
        .tls_config(tls)?
        .connect_timeout(Duration::from_secs(5))
        .connect()
        .await
}

#[tokio::test]
async fn mutual_tls_accepts_client_signed_by_root() {
    let plugin = launch(PluginInstance::collector(Mock), &tls_args()).await;
    assert_eq!(plugin.preamble["Meta"]["Unsecure"], false);
    assert_eq!(plugin.preamble["Meta"]["TLSEnabled"], true);

    let channel = connect(&plugin.addr, client_tls(true)).await.unwrap();
    let mut client = CollectorClient::new(channel);
    client.ping(rpc::Empty {}).await.unwrap();

    let types = client
        .get_metric_types(rpc::GetMetricTypesArg::default())
        .await
        .unwrap()
        .into_inner();
    assert_eq!(types.metrics.len(), 2);

    client.kill(rpc::KillArg::default()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), plugin.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn mutual_tls_rejects_client_without_certificate() {
    let plugin = launch(PluginInstance::collector(Mock), &tls_args()).await;

    let rejected = match connect(&plugin.addr, client_tls(false)).await {
        Err(_) => true,
        Ok(channel) => CollectorClient::new(channel)
            .ping(rpc::Empty {})
            .await
            .is_err(),
    };
    assert!(rejected);

    // The listener keeps serving authenticated clients.
    let channel = connect(&plugin.addr, client_tls(true)).await.unwrap();
    let mut client = CollectorClient::new(channel);
    client.kill(rpc::KillArg::default()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), plugin.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn tls_without_key_path_fails_before_preamble() {
    let args = serde_json::json!({
        "TLSEnabled": true,
        "CertPath": fixture("server.crt"),
    })
    .to_string();
    let (io, mut rx) = snap_plugin_runtime::ChannelIo::new(["plugin".to_string(), args]);

    let err = snap_plugin_runtime::PluginRunner::new()
        .with_io(io)
        .run(PluginInstance::collector(Mock), "mock", 1, &[])
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to enable TLS for plugin - need both CertPath and KeyPath"
    );
    assert!(rx.try_recv().is_err());
}
