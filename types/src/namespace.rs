use snap_plugin_proto::rpc;
use std::fmt;

/// One element of a metric namespace.
///
/// A static element only carries a `value`. A dynamic element has a non-empty
/// `name` and stands for variable data (its advertised value is `*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamespaceElement {
    pub value: String,
    pub description: String,
    pub name: String,
}

impl NamespaceElement {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !self.name.is_empty()
    }
}

impl From<NamespaceElement> for rpc::NamespaceElement {
    fn from(element: NamespaceElement) -> Self {
        rpc::NamespaceElement {
            value: element.value,
            description: element.description,
            name: element.name,
        }
    }
}

impl From<rpc::NamespaceElement> for NamespaceElement {
    fn from(element: rpc::NamespaceElement) -> Self {
        NamespaceElement {
            value: element.value,
            description: element.description,
            name: element.name,
        }
    }
}

/// Ordered list of elements identifying a metric, e.g. `/intel/mock/foo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace(Vec<NamespaceElement>);

impl Namespace {
    /// Build a namespace of static elements.
    pub fn new<S: AsRef<str>>(values: &[S]) -> Self {
        Self(
            values
                .iter()
                .map(|v| NamespaceElement::new(v.as_ref()))
                .collect(),
        )
    }

    pub fn add_static_element(mut self, value: impl Into<String>) -> Self {
        self.0.push(NamespaceElement::new(value));
        self
    }

    pub fn add_static_elements<S: AsRef<str>>(mut self, values: &[S]) -> Self {
        self.0
            .extend(values.iter().map(|v| NamespaceElement::new(v.as_ref())));
        self
    }

    pub fn add_dynamic_element(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.0.push(NamespaceElement {
            value: "*".to_string(),
            description: description.into(),
            name: name.into(),
        });
        self
    }

    /// Element at `idx`, or an empty element when out of range.
    pub fn element(&self, idx: usize) -> NamespaceElement {
        self.0.get(idx).cloned().unwrap_or_default()
    }

    pub fn elements(&self) -> &[NamespaceElement] {
        &self.0
    }

    pub fn elements_mut(&mut self) -> &mut [NamespaceElement] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indexes of the dynamic elements; empty when the namespace is static.
    pub fn is_dynamic(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_dynamic())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn strings(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.value.as_str()).collect()
    }

    /// Elements joined with `.`, the form used for config-policy lookups.
    pub fn key(&self) -> String {
        self.strings().join(".")
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.strings().join("/"))
    }
}

impl From<Vec<NamespaceElement>> for Namespace {
    fn from(elements: Vec<NamespaceElement>) -> Self {
        Self(elements)
    }
}

impl From<Namespace> for Vec<rpc::NamespaceElement> {
    fn from(ns: Namespace) -> Self {
        ns.0.into_iter().map(Into::into).collect()
    }
}

impl From<Vec<rpc::NamespaceElement>> for Namespace {
    fn from(elements: Vec<rpc::NamespaceElement>) -> Self {
        Self(elements.into_iter().map(Into::into).collect())
    }
}
