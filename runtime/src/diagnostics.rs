use crate::io::ProcessIo;
use crate::meta::Meta;
use crate::plugin::PluginInstance;
use crate::proxy::guarded;
use crate::{Result, RuntimeError};
use snap_plugin_types::{Config, ConfigPolicy, Metric};
use std::time::Instant;

/// Prints diagnostics output and stage timings.
struct Report<'a> {
    io: &'a dyn ProcessIo,
}

impl Report<'_> {
    fn line(&self, line: impl AsRef<str>) {
        self.io.print_out(line.as_ref());
    }

    fn took(&self, stage: &str, start: Instant) {
        self.line(format!(
            "{} took {}",
            stage,
            humantime::format_duration(start.elapsed())
        ));
        self.line("");
    }

    /// Print `message` and turn it into the error that ends diagnostics.
    fn fail(&self, message: String) -> RuntimeError {
        self.line(&message);
        RuntimeError::Diagnostics(message)
    }

    fn runtime_details(&self, meta: &Meta) {
        let start = Instant::now();
        self.line("Runtime Details:");
        self.line(format!("    PluginName: {}, Version: {}", meta.name, meta.version));
        self.line(format!(
            "    RPC Type: {}, RPC Version: {}",
            meta.rpc_type, meta.rpc_version
        ));
        self.line(format!("    Operating system: {}", std::env::consts::OS));
        self.line(format!("    Architecture: {}", std::env::consts::ARCH));
        self.took("printRuntimeDetails", start);
    }

    async fn config_policy(&self, instance: &PluginInstance, config: &Config) -> Result<()> {
        let start = Instant::now();
        let policy: ConfigPolicy = guarded(instance.get_config_policy())
            .await
            .map_err(|e| self.fail(format!("! Error in the call to GetConfigPolicy: \n{}", e)))?;

        self.line("Config Policy:");
        for (namespace, rule) in policy.rules() {
            self.line(format!(
                "    Namespace: {:<30}  Key: {:<10}  Info: {}",
                namespace,
                rule.key(),
                rule
            ));
        }

        let missing = policy.missing_required(config);
        for key in &missing {
            self.line(format!(
                "! Warning: \"{}\" required by plugin and not provided in config",
                key
            ));
        }
        if !missing.is_empty() {
            self.line(
                "! Please provide config in form of: --config '{\"key\":\"kelly\", \"spirit-animal\":\"coatimundi\"}'",
            );
        }

        self.took("printConfigPolicy", start);
        Ok(())
    }

    fn catalog(&self, metrics: &[Metric]) {
        self.line("Metric catalog will be updated to include: ");
        for metric in metrics {
            self.line(format!("    Namespace: {}", metric.namespace));
        }
    }

    fn collected(&self, metrics: &[Metric]) {
        self.line("Metrics that can be collected right now are: ");
        for metric in metrics {
            let (kind, value) = match &metric.data {
                Some(data) => (data.type_name(), data.to_string()),
                None => ("<nil>", "<nil>".to_string()),
            };
            self.line(format!(
                "    Namespace: {:<30}  Type: {:<10}  Value: {}",
                metric.namespace.to_string(),
                kind,
                value
            ));
        }
    }
}

/// Run the plugin locally, bypassing gRPC, and print what it reports.
///
/// Collectors go through policy, metric types and one collection; the
/// supplied config is attached to every metric type before collecting.
pub async fn run(
    instance: &PluginInstance,
    meta: &Meta,
    config: Config,
    io: &dyn ProcessIo,
) -> Result<()> {
    let report = Report { io };
    let start = Instant::now();

    report.runtime_details(meta);
    report.config_policy(instance, &config).await?;

    match instance {
        PluginInstance::Collector(collector) => {
            let stage = Instant::now();
            let mut metrics = guarded(collector.get_metric_types(config.clone()))
                .await
                .map_err(|e| report.fail(format!("! Error in the call to GetMetricTypes: \n{}", e)))?;
            for metric in &mut metrics {
                metric.config = config.clone();
            }
            report.catalog(&metrics);
            report.took("printMetricTypes", stage);

            let stage = Instant::now();
            let collected = guarded(collector.collect_metrics(metrics)).await.map_err(|e| {
                report.fail(format!(
                    "! Error in the call to CollectMetrics. Please ensure your config contains any required fields mentioned in the error below. \n {}",
                    e
                ))
            })?;
            report.collected(&collected);
            report.took("printCollectMetrics", stage);
        }
        PluginInstance::StreamCollector(collector) => {
            let stage = Instant::now();
            let metrics = guarded(collector.get_metric_types(config.clone()))
                .await
                .map_err(|e| report.fail(format!("! Error in the call to GetMetricTypes: \n{}", e)))?;
            report.catalog(&metrics);
            report.took("printMetricTypes", stage);
            report.line("Metric collection is not available in diagnostics for stream collectors.");
        }
        PluginInstance::Processor(_) => {
            report.line("Diagnostics not currently available for processor plugins.");
        }
        PluginInstance::Publisher(_) => {
            report.line("Diagnostics not currently available for publisher plugins.");
        }
    }

    report.took("showDiagnostics", start);
    Ok(())
}
