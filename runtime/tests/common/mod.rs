#![allow(dead_code)]

use async_trait::async_trait;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_runtime::{
    ChannelIo, Collector, Plugin, PluginInstance, PluginRunner, Processor, Publisher,
    StreamChannels, StreamCollector,
};
use snap_plugin_types::{Config, ConfigPolicy, Metric, Namespace, StringRule};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A plugin implementing every kind, failing when the config says so.
pub struct Mock;

fn mock_policy() -> Result<ConfigPolicy> {
    let mut policy = ConfigPolicy::new();
    policy.add_string_rule(&["intel", "mock"], StringRule::new("name", true)?);
    Ok(policy)
}

#[async_trait]
impl Plugin for Mock {
    async fn get_config_policy(&self) -> Result<ConfigPolicy> {
        mock_policy()
    }
}

#[async_trait]
impl Collector for Mock {
    async fn get_metric_types(&self, _config: Config) -> Result<Vec<Metric>> {
        Ok(vec![
            Metric::new(Namespace::new(&["intel", "mock", "foo"])),
            Metric::new(Namespace::new(&["intel", "mock", "bar"])),
        ])
    }

    async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
        if metrics.iter().any(|m| m.config.contains_key("fail")) {
            return Err(PluginError::msg("collection failed"));
        }
        Ok(metrics.into_iter().map(|m| m.with_data(1i64)).collect())
    }
}

#[async_trait]
impl Processor for Mock {
    async fn process(&self, metrics: Vec<Metric>, config: Config) -> Result<Vec<Metric>> {
        if config.contains_key("fail") {
            return Err(PluginError::msg("processing failed"));
        }
        Ok(metrics)
    }
}

#[async_trait]
impl Publisher for Mock {
    async fn publish(&self, _metrics: Vec<Metric>, config: Config) -> Result<()> {
        if config.contains_key("fail") {
            return Err(PluginError::msg("publishing failed"));
        }
        Ok(())
    }
}

/// Answers every request with a single batch of three metrics.
pub struct Burst;

#[async_trait]
impl Plugin for Burst {
    async fn get_config_policy(&self) -> Result<ConfigPolicy> {
        Ok(ConfigPolicy::new())
    }
}

#[async_trait]
impl StreamCollector for Burst {
    async fn stream_metrics(&self, channels: StreamChannels) -> Result<()> {
        let StreamChannels {
            mut requests,
            metrics,
            errors,
        } = channels;

        tokio::spawn(async move {
            while let Some(requested) = requests.recv().await {
                if requested.is_empty() {
                    let _ = errors.send("nothing requested".to_string()).await;
                    continue;
                }
                let batch = (0..3)
                    .map(|i| Metric::new(Namespace::new(&["burst", "value"])).with_data(i as i64))
                    .collect();
                if metrics.send(batch).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn get_metric_types(&self, _config: Config) -> Result<Vec<Metric>> {
        Ok(vec![Metric::new(Namespace::new(&["burst", "value"]))])
    }
}

pub struct Launched {
    pub addr: String,
    pub preamble: serde_json::Value,
    pub task: JoinHandle<snap_plugin_runtime::Result<()>>,
}

/// Start `instance` with `args` as the runtime JSON and wait for its preamble.
pub async fn launch(instance: PluginInstance, args: &str) -> Launched {
    let (io, mut rx) = ChannelIo::new(["plugin".to_string(), args.to_string()]);
    let runner = PluginRunner::new().with_io(io);
    let task = tokio::spawn(async move { runner.run(instance, "mock", 1, &[]).await });

    let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no preamble printed")
        .expect("plugin exited before printing the preamble");
    let preamble: serde_json::Value = serde_json::from_str(&line).expect("preamble is JSON");
    let addr = preamble["ListenAddress"]
        .as_str()
        .expect("ListenAddress")
        .to_string();

    Launched {
        addr,
        preamble,
        task,
    }
}

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}
