use crate::Config;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_proto::rpc;
use std::collections::BTreeMap;
use std::fmt;

/// Behaviour shared by the typed config-policy rules.
pub trait Rule: fmt::Display {
    fn key(&self) -> &str;
    fn required(&self) -> bool;
}

fn check_key(key: String) -> Result<String> {
    if key.is_empty() {
        return Err(PluginError::EmptyKey);
    }
    Ok(key)
}

fn write_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, name: &str, v: &Option<T>) -> fmt::Result {
    match v {
        Some(v) => write!(f, " {name}:{v}"),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringRule {
    key: String,
    required: bool,
    default: Option<String>,
}

impl StringRule {
    pub fn new(key: impl Into<String>, required: bool) -> Result<Self> {
        Ok(Self {
            key: check_key(key.into())?,
            required,
            default: None,
        })
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolRule {
    key: String,
    required: bool,
    default: Option<bool>,
}

impl BoolRule {
    pub fn new(key: impl Into<String>, required: bool) -> Result<Self> {
        Ok(Self {
            key: check_key(key.into())?,
            required,
            default: None,
        })
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = Some(default);
        self
    }

    pub fn default_value(&self) -> Option<bool> {
        self.default
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerRule {
    key: String,
    required: bool,
    default: Option<i64>,
    minimum: Option<i64>,
    maximum: Option<i64>,
}

impl IntegerRule {
    pub fn new(key: impl Into<String>, required: bool) -> Result<Self> {
        Ok(Self {
            key: check_key(key.into())?,
            required,
            default: None,
            minimum: None,
            maximum: None,
        })
    }

    pub fn with_default(mut self, default: i64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_min(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_max(mut self, maximum: i64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn default_value(&self) -> Option<i64> {
        self.default
    }

    pub fn minimum(&self) -> Option<i64> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<i64> {
        self.maximum
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatRule {
    key: String,
    required: bool,
    default: Option<f64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl FloatRule {
    pub fn new(key: impl Into<String>, required: bool) -> Result<Self> {
        Ok(Self {
            key: check_key(key.into())?,
            required,
            default: None,
            minimum: None,
            maximum: None,
        })
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn default_value(&self) -> Option<f64> {
        self.default
    }

    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }
}

macro_rules! impl_rule {
    ($($ty:ty),*) => {
        $(
            impl Rule for $ty {
                fn key(&self) -> &str {
                    &self.key
                }

                fn required(&self) -> bool {
                    self.required
                }
            }
        )*
    };
}

impl_rule!(StringRule, BoolRule, IntegerRule, FloatRule);

impl fmt::Display for StringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:string required:{}", self.required)?;
        write_opt(f, "default", &self.default)
    }
}

impl fmt::Display for BoolRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:bool required:{}", self.required)?;
        write_opt(f, "default", &self.default)
    }
}

impl fmt::Display for IntegerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:integer required:{}", self.required)?;
        write_opt(f, "default", &self.default)?;
        write_opt(f, "minimum", &self.minimum)?;
        write_opt(f, "maximum", &self.maximum)
    }
}

impl fmt::Display for FloatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:float required:{}", self.required)?;
        write_opt(f, "default", &self.default)?;
        write_opt(f, "minimum", &self.minimum)?;
        write_opt(f, "maximum", &self.maximum)
    }
}

/// Rules of one type, grouped by namespace key and then by rule key.
type RuleTable<R> = BTreeMap<String, BTreeMap<String, R>>;

fn insert_rule<R: Rule, S: AsRef<str>>(table: &mut RuleTable<R>, namespace: &[S], rule: R) {
    let ns = namespace
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".");
    table
        .entry(ns)
        .or_default()
        .insert(rule.key().to_string(), rule);
}

/// The configuration a plugin accepts, declared per metric namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPolicy {
    string_rules: RuleTable<StringRule>,
    bool_rules: RuleTable<BoolRule>,
    integer_rules: RuleTable<IntegerRule>,
    float_rules: RuleTable<FloatRule>,
}

impl ConfigPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule under `namespace`, replacing any rule with the same key.
    pub fn add_string_rule<S: AsRef<str>>(&mut self, namespace: &[S], rule: StringRule) {
        insert_rule(&mut self.string_rules, namespace, rule);
    }

    pub fn add_bool_rule<S: AsRef<str>>(&mut self, namespace: &[S], rule: BoolRule) {
        insert_rule(&mut self.bool_rules, namespace, rule);
    }

    pub fn add_int_rule<S: AsRef<str>>(&mut self, namespace: &[S], rule: IntegerRule) {
        insert_rule(&mut self.integer_rules, namespace, rule);
    }

    pub fn add_float_rule<S: AsRef<str>>(&mut self, namespace: &[S], rule: FloatRule) {
        insert_rule(&mut self.float_rules, namespace, rule);
    }

    pub fn string_rules(&self) -> &BTreeMap<String, BTreeMap<String, StringRule>> {
        &self.string_rules
    }

    pub fn bool_rules(&self) -> &BTreeMap<String, BTreeMap<String, BoolRule>> {
        &self.bool_rules
    }

    pub fn integer_rules(&self) -> &BTreeMap<String, BTreeMap<String, IntegerRule>> {
        &self.integer_rules
    }

    pub fn float_rules(&self) -> &BTreeMap<String, BTreeMap<String, FloatRule>> {
        &self.float_rules
    }

    /// Every declared rule as `(namespace, rule)`, strings first, then
    /// integers, floats and bools.
    pub fn rules(&self) -> Vec<(&str, &dyn Rule)> {
        fn flatten<R: Rule>(table: &RuleTable<R>) -> impl Iterator<Item = (&str, &dyn Rule)> {
            table.iter().flat_map(|(ns, rules)| {
                rules.values().map(move |r| (ns.as_str(), r as &dyn Rule))
            })
        }

        flatten(&self.string_rules)
            .chain(flatten(&self.integer_rules))
            .chain(flatten(&self.float_rules))
            .chain(flatten(&self.bool_rules))
            .collect()
    }

    /// Keys of required rules not present in `config`.
    pub fn missing_required(&self, config: &Config) -> Vec<String> {
        let mut missing: Vec<String> = self
            .rules()
            .into_iter()
            .filter(|(_, rule)| rule.required() && !config.contains_key(rule.key()))
            .map(|(_, rule)| rule.key().to_string())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    pub fn is_empty(&self) -> bool {
        self.string_rules.is_empty()
            && self.bool_rules.is_empty()
            && self.integer_rules.is_empty()
            && self.float_rules.is_empty()
    }
}

impl From<&StringRule> for rpc::StringRule {
    fn from(r: &StringRule) -> Self {
        rpc::StringRule {
            required: r.required,
            default: r.default.clone().unwrap_or_default(),
            has_default: r.default.is_some(),
        }
    }
}

impl From<&BoolRule> for rpc::BoolRule {
    fn from(r: &BoolRule) -> Self {
        rpc::BoolRule {
            required: r.required,
            default: r.default.unwrap_or_default(),
            has_default: r.default.is_some(),
        }
    }
}

impl From<&IntegerRule> for rpc::IntegerRule {
    fn from(r: &IntegerRule) -> Self {
        rpc::IntegerRule {
            required: r.required,
            default: r.default.unwrap_or_default(),
            has_default: r.default.is_some(),
            minimum: r.minimum.unwrap_or_default(),
            has_min: r.minimum.is_some(),
            maximum: r.maximum.unwrap_or_default(),
            has_max: r.maximum.is_some(),
        }
    }
}

impl From<&FloatRule> for rpc::FloatRule {
    fn from(r: &FloatRule) -> Self {
        rpc::FloatRule {
            required: r.required,
            default: r.default.unwrap_or_default(),
            has_default: r.default.is_some(),
            minimum: r.minimum.unwrap_or_default(),
            has_min: r.minimum.is_some(),
            maximum: r.maximum.unwrap_or_default(),
            has_max: r.maximum.is_some(),
        }
    }
}

impl From<&ConfigPolicy> for rpc::GetConfigPolicyReply {
    fn from(policy: &ConfigPolicy) -> Self {
        let mut reply = rpc::GetConfigPolicyReply::default();

        for (ns, rules) in &policy.string_rules {
            let entry = reply.string_policy.entry(ns.clone()).or_default();
            for (key, rule) in rules {
                entry.rules.insert(key.clone(), rule.into());
            }
        }
        for (ns, rules) in &policy.bool_rules {
            let entry = reply.bool_policy.entry(ns.clone()).or_default();
            for (key, rule) in rules {
                entry.rules.insert(key.clone(), rule.into());
            }
        }
        for (ns, rules) in &policy.integer_rules {
            let entry = reply.integer_policy.entry(ns.clone()).or_default();
            for (key, rule) in rules {
                entry.rules.insert(key.clone(), rule.into());
            }
        }
        for (ns, rules) in &policy.float_rules {
            let entry = reply.float_policy.entry(ns.clone()).or_default();
            for (key, rule) in rules {
                entry.rules.insert(key.clone(), rule.into());
            }
        }

        reply
    }
}
