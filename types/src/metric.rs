use crate::{Config, Namespace};
use snap_plugin_proto::rpc;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Value carried by a collected metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricData {
    String(String),
    Float32(f32),
    Float64(f64),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl MetricData {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricData::String(_) => "string",
            MetricData::Float32(_) => "float32",
            MetricData::Float64(_) => "float64",
            MetricData::Int32(_) => "int32",
            MetricData::Int64(_) => "int64",
            MetricData::Uint32(_) => "uint32",
            MetricData::Uint64(_) => "uint64",
            MetricData::Bytes(_) => "[]uint8",
            MetricData::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for MetricData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricData::String(v) => write!(f, "{v}"),
            MetricData::Float32(v) => write!(f, "{v}"),
            MetricData::Float64(v) => write!(f, "{v}"),
            MetricData::Int32(v) => write!(f, "{v}"),
            MetricData::Int64(v) => write!(f, "{v}"),
            MetricData::Uint32(v) => write!(f, "{v}"),
            MetricData::Uint64(v) => write!(f, "{v}"),
            MetricData::Bytes(v) => write!(f, "{v:?}"),
            MetricData::Bool(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from_data {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MetricData {
                fn from(v: $ty) -> Self {
                    MetricData::$variant(v)
                }
            }
        )*
    };
}

impl_from_data! {
    String => String,
    f32 => Float32,
    f64 => Float64,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    Vec<u8> => Bytes,
    bool => Bool,
}

impl From<&str> for MetricData {
    fn from(v: &str) -> Self {
        MetricData::String(v.to_string())
    }
}

impl From<MetricData> for rpc::metric::Data {
    fn from(data: MetricData) -> Self {
        use rpc::metric::Data;
        match data {
            MetricData::String(v) => Data::StringData(v),
            MetricData::Float32(v) => Data::Float32Data(v),
            MetricData::Float64(v) => Data::Float64Data(v),
            MetricData::Int32(v) => Data::Int32Data(v),
            MetricData::Int64(v) => Data::Int64Data(v),
            MetricData::Uint32(v) => Data::Uint32Data(v),
            MetricData::Uint64(v) => Data::Uint64Data(v),
            MetricData::Bytes(v) => Data::BytesData(v),
            MetricData::Bool(v) => Data::BoolData(v),
        }
    }
}

impl From<rpc::metric::Data> for MetricData {
    fn from(data: rpc::metric::Data) -> Self {
        use rpc::metric::Data;
        match data {
            Data::StringData(v) => MetricData::String(v),
            Data::Float32Data(v) => MetricData::Float32(v),
            Data::Float64Data(v) => MetricData::Float64(v),
            Data::Int32Data(v) => MetricData::Int32(v),
            Data::Int64Data(v) => MetricData::Int64(v),
            Data::Uint32Data(v) => MetricData::Uint32(v),
            Data::Uint64Data(v) => MetricData::Uint64(v),
            Data::BytesData(v) => MetricData::Bytes(v),
            Data::BoolData(v) => MetricData::Bool(v),
        }
    }
}

/// A metric type advertised by a collector, or a collected sample of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    pub namespace: Namespace,
    pub version: i64,
    pub config: Config,
    /// `None` for metric types and for samples without a value.
    pub data: Option<MetricData>,
    pub tags: HashMap<String, String>,
    pub timestamp: Option<SystemTime>,
    pub unit: String,
    pub description: String,
    // Passed through for the host; plugins have no use for it.
    last_advertised_time: Option<SystemTime>,
}

impl Metric {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<MetricData>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn last_advertised_time(&self) -> Option<SystemTime> {
        self.last_advertised_time
    }
}

fn to_proto_time(t: SystemTime) -> rpc::Time {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    rpc::Time {
        sec: since_epoch.as_secs() as i64,
        nsec: i64::from(since_epoch.subsec_nanos()),
    }
}

/// `None` for negative fields or instants the platform cannot represent.
fn from_proto_time(t: rpc::Time) -> Option<SystemTime> {
    let secs = u64::try_from(t.sec).ok()?;
    let nanos = u64::try_from(t.nsec).ok()?;
    let since_epoch = Duration::from_secs(secs).checked_add(Duration::from_nanos(nanos))?;
    UNIX_EPOCH.checked_add(since_epoch)
}

impl From<Metric> for rpc::Metric {
    /// Missing timestamps are filled with the current time.
    fn from(mt: Metric) -> Self {
        let now = SystemTime::now();
        rpc::Metric {
            namespace: mt.namespace.into(),
            version: mt.version,
            config: Some(mt.config.into()),
            last_advertised_time: Some(to_proto_time(mt.last_advertised_time.unwrap_or(now))),
            tags: mt.tags,
            timestamp: Some(to_proto_time(mt.timestamp.unwrap_or(now))),
            unit: mt.unit,
            description: mt.description,
            data: mt.data.map(Into::into),
        }
    }
}

impl From<rpc::Metric> for Metric {
    fn from(mt: rpc::Metric) -> Self {
        Metric {
            namespace: mt.namespace.into(),
            version: mt.version,
            config: mt.config.into(),
            data: mt.data.map(Into::into),
            tags: mt.tags,
            timestamp: mt.timestamp.and_then(from_proto_time),
            unit: mt.unit,
            description: mt.description,
            last_advertised_time: mt.last_advertised_time.and_then(from_proto_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_proto_fills_missing_timestamps() {
        let before = SystemTime::now() - Duration::from_secs(1);
        let wire = rpc::Metric::from(Metric::new(Namespace::new(&["a", "b"])));

        let timestamp = from_proto_time(wire.timestamp.unwrap()).unwrap();
        assert!(timestamp >= before);
        assert!(wire.last_advertised_time.is_some());
        assert!(wire.data.is_none());
    }

    #[test]
    fn wire_conversion_keeps_fields() {
        let ts = UNIX_EPOCH + Duration::new(1_500_000_000, 123);
        let mut metric = Metric::new(Namespace::new(&["intel", "mock", "foo"]))
            .with_data(42i64)
            .with_tag("host", "node-1")
            .with_config(Config::new().with("password", "secret"));
        metric.timestamp = Some(ts);
        metric.unit = "B".into();
        metric.version = 3;

        let back = Metric::from(rpc::Metric::from(metric.clone()));
        assert_eq!(back.namespace, metric.namespace);
        assert_eq!(back.data, Some(MetricData::Int64(42)));
        assert_eq!(back.timestamp, Some(ts));
        assert_eq!(back.tags.get("host").map(String::as_str), Some("node-1"));
        assert_eq!(back.config.get_string("password").unwrap(), "secret");
        assert_eq!(back.unit, "B");
        assert_eq!(back.version, 3);
        assert!(back.last_advertised_time().is_some());
    }

    #[test]
    fn unrepresentable_timestamps_are_dropped() {
        let mut wire = rpc::Metric::from(Metric::new(Namespace::new(&["a"])));
        wire.timestamp = Some(rpc::Time {
            sec: i64::MAX,
            nsec: i64::MAX,
        });
        wire.last_advertised_time = Some(rpc::Time { sec: -1, nsec: 0 });

        let metric = Metric::from(wire);
        assert_eq!(metric.timestamp, None);
        assert_eq!(metric.last_advertised_time(), None);
    }

    #[test]
    fn nanoseconds_past_one_second_carry() {
        let t = from_proto_time(rpc::Time {
            sec: 10,
            nsec: 2_500_000_000,
        });
        assert_eq!(t, Some(UNIX_EPOCH + Duration::new(12, 500_000_000)));
    }

    #[test]
    fn data_type_names() {
        assert_eq!(MetricData::from("x").type_name(), "string");
        assert_eq!(MetricData::from(1.5f64).type_name(), "float64");
        assert_eq!(MetricData::from(vec![1u8]).type_name(), "[]uint8");
    }
}
