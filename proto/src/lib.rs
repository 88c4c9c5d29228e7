#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! This crate contains the protobuf messages of the Snap plugin protocol and
//! the tonic client/server code of its four services.
//!
//! # Services
//! - `Collector`: `GetMetricTypes`, `CollectMetrics`
//! - `Processor`: `Process`
//! - `Publisher`: `Publish`
//! - `StreamCollector`: `GetMetricTypes`, bidirectional `StreamMetrics`, `SetConfig`
//!
//! Every service additionally serves `Ping`, `Kill` and `GetConfigPolicy`.

pub mod rpc {
    mod messages;
    pub use messages::*;

    // Tonic generated code - skip formatting and lint checks
    #[rustfmt::skip]
    #[allow(warnings)]
    mod generated {
        include!(concat!(env!("OUT_DIR"), "/rpc.Collector.rs"));
        include!(concat!(env!("OUT_DIR"), "/rpc.Processor.rs"));
        include!(concat!(env!("OUT_DIR"), "/rpc.Publisher.rs"));
        include!(concat!(env!("OUT_DIR"), "/rpc.StreamCollector.rs"));
    }

    pub use generated::{
        collector_client, collector_server, processor_client, processor_server,
        publisher_client, publisher_server, stream_collector_client, stream_collector_server,
    };
}
