//! Data model shared by plugin implementations and the plugin runtime.
//!
//! Everything here has a wire counterpart in [`snap_plugin_proto::rpc`]; the
//! conversions live next to each type.

mod config;
mod metric;
mod namespace;
mod policy;

pub use config::{Config, ConfigValue};
pub use metric::{Metric, MetricData};
pub use namespace::{Namespace, NamespaceElement};
pub use policy::{BoolRule, ConfigPolicy, FloatRule, IntegerRule, Rule, StringRule};

pub use snap_plugin_error::{PluginError, Result};
