//! Collector plugin producing random values.
//!
//! Run without arguments to see its diagnostics:
//!
//! ```text
//! cargo run --example rand_collector -- --config '{"value":"hello"}'
//! ```
//!
//! Metrics:
//! - `/random/integer`, `/random/float`, `/random/string`: random values,
//!   overridden by `testint`, `testfloat` and `teststring` in the config
//! - `/static/string`: the configured `value`
//!
//! Setting `return_error` to true in a metric's config makes collection fail.

use async_trait::async_trait;
use rand::Rng;
use snap_plugin_runtime::{Collector, MetaOpt, Plugin, RoutingStrategy, start_collector};
use snap_plugin_types::{
    Config, ConfigPolicy, FloatRule, IntegerRule, Metric, Namespace, PluginError, Result,
    StringRule,
};
use std::time::SystemTime;
use tracing::debug;

const ANSWERS: &[&str] = &[
    "It is certain",
    "Without a doubt",
    "You may rely on it",
    "Most likely",
    "Reply hazy try again",
    "Ask again later",
    "Cannot predict now",
    "Don't count on it",
    "My sources say no",
    "Very doubtful",
];

struct RandCollector;

fn versioned(namespace: Namespace) -> Metric {
    let mut metric = Metric::new(namespace);
    metric.version = 1;
    metric
}

impl RandCollector {
    fn sample(&self, metric: Metric) -> Result<Metric> {
        let mut rng = rand::thread_rng();
        let config = metric.config.clone();
        let first = metric.namespace.element(0).value;
        let last = metric
            .namespace
            .elements()
            .last()
            .map(|e| e.value.clone())
            .unwrap_or_default();

        let mut metric = if first == "static" {
            let value = config
                .get_string("value")
                .map_err(|_| PluginError::msg("Invalid or missing value key."))?;
            metric.with_data(value.to_string())
        } else {
            match last.as_str() {
                "integer" => metric.with_data(
                    config
                        .get_int("testint")
                        .unwrap_or_else(|_| rng.gen_range(0..1000)),
                ),
                "float" => metric.with_data(
                    config
                        .get_float("testfloat")
                        .unwrap_or_else(|_| rng.gen_range(0.0..1000.0)),
                ),
                "string" => metric.with_data(match config.get_string("teststring") {
                    Ok(value) => value.to_string(),
                    Err(_) => ANSWERS[rng.gen_range(0..ANSWERS.len())].to_string(),
                }),
                _ => {
                    return Err(PluginError::msg(format!(
                        "Invalid metric: {}",
                        metric.namespace
                    )));
                }
            }
        };

        metric.timestamp = Some(SystemTime::now());
        Ok(metric)
    }
}

#[async_trait]
impl Plugin for RandCollector {
    async fn get_config_policy(&self) -> Result<ConfigPolicy> {
        let mut policy = ConfigPolicy::new();
        policy.add_string_rule(&["static", "string"], StringRule::new("value", false)?);
        policy.add_int_rule(
            &["random", "integer"],
            IntegerRule::new("testint", false)?.with_min(0).with_max(1000),
        );
        policy.add_float_rule(
            &["random", "float"],
            FloatRule::new("testfloat", false)?
                .with_min(0.0)
                .with_max(1000.0),
        );
        policy.add_string_rule(&["random", "string"], StringRule::new("teststring", false)?);
        Ok(policy)
    }
}

#[async_trait]
impl Collector for RandCollector {
    async fn get_metric_types(&self, config: Config) -> Result<Vec<Metric>> {
        if config.contains_key("depsReq") {
            return Err(PluginError::msg(
                "! Dependency XX required. Run `make deps` to resolve.",
            ));
        }

        let mut metrics: Vec<Metric> = ["integer", "float", "string"]
            .iter()
            .map(|kind| versioned(Namespace::new(&["random", *kind])))
            .collect();
        if config.contains_key("value") {
            metrics.push(versioned(Namespace::new(&["static", "string"])));
        }
        Ok(metrics)
    }

    async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
        debug!("Collecting {} metrics", metrics.len());
        let mut collected = Vec::with_capacity(metrics.len());
        for metric in metrics {
            if metric.config.get_bool("return_error").unwrap_or(false) {
                return Err(PluginError::msg("Houston, we have a problem!"));
            }
            collected.push(self.sample(metric)?);
        }
        Ok(collected)
    }
}

fn main() {
    std::process::exit(start_collector(
        RandCollector,
        "test-rand-collector",
        1,
        &[
            MetaOpt::ConcurrencyCount(5),
            MetaOpt::RoutingStrategy(RoutingStrategy::Sticky),
        ],
    ));
}
