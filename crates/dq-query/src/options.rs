//! Freshness policy and refetch triggers
//!
//! Refetching is driven by named triggers configured per entry, never by a
//! view's lifecycle. Invalidation and explicit refresh always refetch.

use std::time::Duration;

/// Default inactivity window before an unsubscribed entry is evicted
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

/// Events that may start a background refetch of a stale entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefetchTriggers {
    /// A new subscription finds the entry stale
    pub on_subscribe: bool,
    /// The application signals focus through [`crate::QueryStore::focus`]
    pub on_focus: bool,
    /// Poll while at least one subscriber remains
    pub interval: Option<Duration>,
}

impl RefetchTriggers {
    /// Only invalidation, explicit refresh and expiry refetch
    #[inline]
    #[must_use]
    pub const fn explicit_only() -> Self {
        Self {
            on_subscribe: false,
            on_focus: false,
            interval: None,
        }
    }
}

impl Default for RefetchTriggers {
    fn default() -> Self {
        Self {
            on_subscribe: true,
            on_focus: true,
            interval: None,
        }
    }
}

/// Per-entry cache options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Data younger than this is served without a network call
    pub stale_time: Duration,
    /// Entry with zero subscribers is evicted after this window
    pub cache_time: Duration,
    /// Events that refetch a stale entry
    pub triggers: RefetchTriggers,
}

impl QueryOptions {
    /// Default options: always stale, five minute cache time
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With stale time
    #[inline]
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// With cache time
    #[inline]
    #[must_use]
    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    /// With triggers
    #[inline]
    #[must_use]
    pub fn with_triggers(mut self, triggers: RefetchTriggers) -> Self {
        self.triggers = triggers;
        self
    }

    /// With polling interval
    #[inline]
    #[must_use]
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.triggers.interval = Some(interval);
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            cache_time: DEFAULT_CACHE_TIME,
            triggers: RefetchTriggers::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = QueryOptions::new();
        assert_eq!(options.stale_time, Duration::ZERO);
        assert_eq!(options.cache_time, DEFAULT_CACHE_TIME);
        assert!(options.triggers.on_subscribe);
        assert!(options.triggers.on_focus);
    }

    #[test]
    fn explicit_only_disables_lifecycle_triggers() {
        let options = QueryOptions::new()
            .with_stale_time(Duration::from_secs(60))
            .with_triggers(RefetchTriggers::explicit_only());
        assert!(!options.triggers.on_subscribe);
        assert!(!options.triggers.on_focus);
        assert_eq!(options.triggers.interval, None);
    }
}
