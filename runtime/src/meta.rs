use crate::args::RuntimeArgs;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginType {
    Collector = 0,
    Processor = 1,
    Publisher = 2,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginType::Collector => "collector",
            PluginType::Processor => "processor",
            PluginType::Publisher => "publisher",
        })
    }
}

/// How the host picks among running instances of the plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoutingStrategy {
    #[default]
    LeastRecentlyUsed = 0,
    Sticky = 1,
    Config = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcType {
    Grpc = 2,
    GrpcStream = 3,
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcType::Grpc => write!(f, "GRPC (2)"),
            RpcType::GrpcStream => write!(f, "GRPCStream (3)"),
        }
    }
}

macro_rules! serialize_as_code {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_i32(*self as i32)
                }
            }
        )*
    };
}

serialize_as_code!(PluginType, RoutingStrategy, RpcType);

/// Option overriding one of the [`Meta`] defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetaOpt {
    /// Max number of concurrent calls one instance takes.
    ConcurrencyCount(i32),
    /// Run a single instance regardless of the number of tasks.
    Exclusive(bool),
    /// How long the host caches collected metrics.
    CacheTtl(Duration),
    RoutingStrategy(RoutingStrategy),
    /// Talk to the host without encryption.
    Unsecure(bool),
    RpcType(RpcType),
}

pub const DEFAULT_CONCURRENCY_COUNT: i32 = 5;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(500);
pub const RPC_VERSION: i32 = 1;

fn serialize_nanos<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_nanos().min(u128::from(u64::MAX)) as u64)
}

/// Identity and host-facing policy of a running plugin.
///
/// Serialized as the `Meta` member of the preamble.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Meta {
    #[serde(rename = "Type")]
    pub kind: PluginType,
    pub name: String,
    pub version: i32,
    pub concurrency_count: i32,
    pub exclusive: bool,
    pub unsecure: bool,
    #[serde(rename = "CacheTTL", serialize_with = "serialize_nanos")]
    pub cache_ttl: Duration,
    pub routing_strategy: RoutingStrategy,
    #[serde(rename = "RPCType")]
    pub rpc_type: RpcType,
    #[serde(rename = "RPCVersion")]
    pub rpc_version: i32,
    pub cert_path: String,
    pub key_path: String,
    #[serde(rename = "TLSEnabled")]
    pub tls_enabled: bool,
    pub root_cert_paths: String,
}

impl Meta {
    pub fn new(kind: PluginType, name: impl Into<String>, version: i32, opts: &[MetaOpt]) -> Self {
        let mut meta = Self {
            kind,
            name: name.into(),
            version,
            concurrency_count: DEFAULT_CONCURRENCY_COUNT,
            exclusive: false,
            unsecure: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            routing_strategy: RoutingStrategy::default(),
            rpc_type: RpcType::Grpc,
            rpc_version: RPC_VERSION,
            cert_path: String::new(),
            key_path: String::new(),
            tls_enabled: false,
            root_cert_paths: String::new(),
        };

        for opt in opts {
            match *opt {
                MetaOpt::ConcurrencyCount(n) => meta.concurrency_count = n,
                MetaOpt::Exclusive(e) => meta.exclusive = e,
                MetaOpt::CacheTtl(ttl) => meta.cache_ttl = ttl,
                MetaOpt::RoutingStrategy(r) => meta.routing_strategy = r,
                MetaOpt::Unsecure(u) => meta.unsecure = u,
                MetaOpt::RpcType(t) => meta.rpc_type = t,
            }
        }

        meta
    }

    /// Copy the security section of the runtime arguments.
    pub fn with_security(mut self, args: &RuntimeArgs) -> Self {
        self.tls_enabled = args.tls_enabled;
        self.cert_path = args.cert_path.clone();
        self.key_path = args.key_path.clone();
        self.root_cert_paths = args.root_cert_paths.clone();
        if args.tls_enabled {
            self.unsecure = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let meta = Meta::new(PluginType::Collector, "mock", 1, &[]);
        assert_eq!(meta.concurrency_count, 5);
        assert!(!meta.exclusive);
        assert!(meta.unsecure);
        assert_eq!(meta.cache_ttl, Duration::from_millis(500));
        assert_eq!(meta.routing_strategy, RoutingStrategy::LeastRecentlyUsed);
        assert_eq!(meta.rpc_type, RpcType::Grpc);
        assert_eq!(meta.rpc_version, 1);
    }

    #[test]
    fn options_override_defaults_in_order() {
        let meta = Meta::new(
            PluginType::Publisher,
            "file",
            3,
            &[
                MetaOpt::ConcurrencyCount(1),
                MetaOpt::ConcurrencyCount(2),
                MetaOpt::Exclusive(true),
                MetaOpt::CacheTtl(Duration::from_secs(1)),
                MetaOpt::RoutingStrategy(RoutingStrategy::Sticky),
            ],
        );
        assert_eq!(meta.concurrency_count, 2);
        assert!(meta.exclusive);
        assert_eq!(meta.cache_ttl, Duration::from_secs(1));
        assert_eq!(meta.routing_strategy, RoutingStrategy::Sticky);
    }

    #[test]
    fn json_layout_uses_numeric_codes() {
        let meta = Meta::new(
            PluginType::Processor,
            "passthru",
            2,
            &[MetaOpt::RpcType(RpcType::GrpcStream)],
        );
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["Type"], json!(1));
        assert_eq!(value["Name"], json!("passthru"));
        assert_eq!(value["CacheTTL"], json!(500_000_000u64));
        assert_eq!(value["RoutingStrategy"], json!(0));
        assert_eq!(value["RPCType"], json!(3));
        assert_eq!(value["RPCVersion"], json!(1));
        assert_eq!(value["TLSEnabled"], json!(false));
    }

    #[test]
    fn security_follows_runtime_args() {
        let args = RuntimeArgs {
            tls_enabled: true,
            cert_path: "a.crt".into(),
            key_path: "a.key".into(),
            ..Default::default()
        };
        let meta = Meta::new(PluginType::Collector, "mock", 1, &[]).with_security(&args);
        assert!(meta.tls_enabled);
        assert!(!meta.unsecure);
        assert_eq!(meta.cert_path, "a.crt");
    }
}
