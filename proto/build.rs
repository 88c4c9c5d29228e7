//! Generates the gRPC client/server code of the plugin services.
//!
//! The message types are written by hand in `src/rpc/messages.rs`, so the services are
//! described with tonic-build's manual builder and no `protoc` is needed.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "rpc";
const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::{input}"))
        .output_type(format!("crate::rpc::{output}"))
        .codec_path(CODEC)
        .build()
}

fn bidi(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::{input}"))
        .output_type(format!("crate::rpc::{output}"))
        .codec_path(CODEC)
        .client_streaming()
        .server_streaming()
        .build()
}

/// Methods every plugin kind serves.
fn common_methods() -> Vec<Method> {
    vec![
        unary("ping", "Ping", "Empty", "ErrReply"),
        unary("kill", "Kill", "KillArg", "ErrReply"),
        unary(
            "get_config_policy",
            "GetConfigPolicy",
            "Empty",
            "GetConfigPolicyReply",
        ),
    ]
}

fn service(name: &str, methods: Vec<Method>) -> Service {
    let mut builder = Service::builder().name(name).package(PACKAGE);
    for method in common_methods().into_iter().chain(methods) {
        builder = builder.method(method);
    }
    builder.build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let collector = service(
        "Collector",
        vec![
            unary(
                "collect_metrics",
                "CollectMetrics",
                "MetricsArg",
                "MetricsReply",
            ),
            unary(
                "get_metric_types",
                "GetMetricTypes",
                "GetMetricTypesArg",
                "MetricsReply",
            ),
        ],
    );

    let processor = service(
        "Processor",
        vec![unary("process", "Process", "PubProcArg", "MetricsReply")],
    );

    let publisher = service(
        "Publisher",
        vec![unary("publish", "Publish", "PubProcArg", "ErrReply")],
    );

    let stream_collector = service(
        "StreamCollector",
        vec![
            bidi("stream_metrics", "StreamMetrics", "CollectArg", "CollectReply"),
            unary(
                "get_metric_types",
                "GetMetricTypes",
                "GetMetricTypesArg",
                "MetricsReply",
            ),
            unary("set_config", "SetConfig", "ConfigMap", "ErrReply"),
        ],
    );

    Builder::new().compile(&[collector, processor, publisher, stream_collector]);
}
