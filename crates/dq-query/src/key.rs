//! Cache keys and key matchers
//!
//! A key is a logical resource name plus an ordered parameter map, so the
//! same filters always address the same entry regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Composite cache key: resource name + serialised parameters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    resource: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    /// Key for a resource with no parameters
    #[inline]
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// With parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// With parameter, skipped when `None`
    #[must_use]
    pub fn with_optional_param<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_param(name, value),
            None => self,
        }
    }

    /// Resource name
    #[inline]
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Parameter value
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All parameters, ordered by name
    #[inline]
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

/// Selects cache entries for invalidation
#[derive(Clone)]
pub enum KeyMatcher {
    /// Exactly one key
    Exact(QueryKey),
    /// Every key of a resource
    Resource(String),
    /// Every key
    All,
    /// Custom predicate
    Predicate(Arc<dyn Fn(&QueryKey) -> bool + Send + Sync>),
}

impl KeyMatcher {
    /// Match every key of `resource`
    #[inline]
    #[must_use]
    pub fn resource(resource: impl Into<String>) -> Self {
        Self::Resource(resource.into())
    }

    /// Match keys accepted by `predicate`
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Whether `key` is selected
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(exact) => exact == key,
            Self::Resource(resource) => key.resource() == resource,
            Self::All => true,
            Self::Predicate(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for KeyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => f.debug_tuple("Exact").field(key).finish(),
            Self::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            Self::All => f.write_str("All"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<QueryKey> for KeyMatcher {
    fn from(key: QueryKey) -> Self {
        Self::Exact(key)
    }
}

impl From<&QueryKey> for KeyMatcher {
    fn from(key: &QueryKey) -> Self {
        Self::Exact(key.clone())
    }
}
