// Message definitions of the `rpc` protobuf package. Field tags are part of
// the wire contract with the host and must not be renumbered.

use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrReply {
    #[prost(string, tag = "1")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KillArg {
    #[prost(string, tag = "1")]
    pub reason: String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Time {
    #[prost(int64, tag = "1")]
    pub sec: i64,
    #[prost(int64, tag = "2")]
    pub nsec: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NamespaceElement {
    #[prost(string, tag = "1")]
    pub value: String,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(string, tag = "3")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigMap {
    #[prost(map = "string, int64", tag = "1")]
    pub int_map: HashMap<String, i64>,
    #[prost(map = "string, string", tag = "2")]
    pub string_map: HashMap<String, String>,
    #[prost(map = "string, double", tag = "3")]
    pub float_map: HashMap<String, f64>,
    #[prost(map = "string, bool", tag = "4")]
    pub bool_map: HashMap<String, bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    #[prost(message, repeated, tag = "1")]
    pub namespace: Vec<NamespaceElement>,
    #[prost(int64, tag = "2")]
    pub version: i64,
    #[prost(message, optional, tag = "3")]
    pub config: Option<ConfigMap>,
    #[prost(message, optional, tag = "4")]
    pub last_advertised_time: Option<Time>,
    #[prost(map = "string, string", tag = "5")]
    pub tags: HashMap<String, String>,
    #[prost(message, optional, tag = "6")]
    pub timestamp: Option<Time>,
    #[prost(string, tag = "7")]
    pub unit: String,
    #[prost(string, tag = "8")]
    pub description: String,
    #[prost(oneof = "metric::Data", tags = "9, 10, 11, 12, 13, 14, 15, 16, 17")]
    pub data: Option<metric::Data>,
}

/// Nested message and enum types in `Metric`.
pub mod metric {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        #[prost(float, tag = "9")]
        Float32Data(f32),
        #[prost(double, tag = "10")]
        Float64Data(f64),
        #[prost(int32, tag = "11")]
        Int32Data(i32),
        #[prost(int64, tag = "12")]
        Int64Data(i64),
        #[prost(bytes = "vec", tag = "13")]
        BytesData(Vec<u8>),
        #[prost(bool, tag = "14")]
        BoolData(bool),
        #[prost(uint32, tag = "15")]
        Uint32Data(u32),
        #[prost(uint64, tag = "16")]
        Uint64Data(u64),
        #[prost(string, tag = "17")]
        StringData(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetricTypesArg {
    #[prost(message, optional, tag = "1")]
    pub config: Option<ConfigMap>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricsArg {
    #[prost(message, repeated, tag = "1")]
    pub metrics: Vec<Metric>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricsReply {
    #[prost(message, repeated, tag = "1")]
    pub metrics: Vec<Metric>,
    #[prost(string, tag = "2")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubProcArg {
    #[prost(message, repeated, tag = "1")]
    pub metrics: Vec<Metric>,
    #[prost(message, optional, tag = "2")]
    pub config: Option<ConfigMap>,
}

/// Control/request frame sent by the host on a metrics stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CollectArg {
    #[prost(message, optional, tag = "1")]
    pub metrics_arg: Option<MetricsArg>,
    /// Nanoseconds; zero leaves the current value untouched.
    #[prost(int64, tag = "2")]
    pub max_collect_duration: i64,
    /// Zero leaves the current value untouched.
    #[prost(int64, tag = "3")]
    pub max_metrics_buffer: i64,
}

/// Frame sent by the plugin on a metrics stream: either a batch or an error.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CollectReply {
    #[prost(message, optional, tag = "1")]
    pub metrics_reply: Option<MetricsReply>,
    #[prost(message, optional, tag = "2")]
    pub error: Option<ErrReply>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BoolRule {
    #[prost(bool, tag = "1")]
    pub required: bool,
    #[prost(bool, tag = "2")]
    pub default: bool,
    #[prost(bool, tag = "3")]
    pub has_default: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringRule {
    #[prost(bool, tag = "1")]
    pub required: bool,
    #[prost(string, tag = "2")]
    pub default: String,
    #[prost(bool, tag = "3")]
    pub has_default: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct IntegerRule {
    #[prost(bool, tag = "1")]
    pub required: bool,
    #[prost(int64, tag = "2")]
    pub default: i64,
    #[prost(bool, tag = "3")]
    pub has_default: bool,
    #[prost(int64, tag = "4")]
    pub minimum: i64,
    #[prost(bool, tag = "5")]
    pub has_min: bool,
    #[prost(int64, tag = "6")]
    pub maximum: i64,
    #[prost(bool, tag = "7")]
    pub has_max: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct FloatRule {
    #[prost(bool, tag = "1")]
    pub required: bool,
    #[prost(double, tag = "2")]
    pub default: f64,
    #[prost(bool, tag = "3")]
    pub has_default: bool,
    #[prost(double, tag = "4")]
    pub minimum: f64,
    #[prost(bool, tag = "5")]
    pub has_min: bool,
    #[prost(double, tag = "6")]
    pub maximum: f64,
    #[prost(bool, tag = "7")]
    pub has_max: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BoolPolicy {
    #[prost(map = "string, message", tag = "1")]
    pub rules: HashMap<String, BoolRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringPolicy {
    #[prost(map = "string, message", tag = "1")]
    pub rules: HashMap<String, StringRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntegerPolicy {
    #[prost(map = "string, message", tag = "1")]
    pub rules: HashMap<String, IntegerRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FloatPolicy {
    #[prost(map = "string, message", tag = "1")]
    pub rules: HashMap<String, FloatRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetConfigPolicyReply {
    #[prost(string, tag = "1")]
    pub error: String,
    #[prost(map = "string, message", tag = "2")]
    pub bool_policy: HashMap<String, BoolPolicy>,
    #[prost(map = "string, message", tag = "3")]
    pub float_policy: HashMap<String, FloatPolicy>,
    #[prost(map = "string, message", tag = "4")]
    pub integer_policy: HashMap<String, IntegerPolicy>,
    #[prost(map = "string, message", tag = "5")]
    pub string_policy: HashMap<String, StringPolicy>,
}
