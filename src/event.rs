//! # Monitoring events and index queries.
//!
//! An [`Event`] is one observation of a `(host, service)` pair. The index keeps
//! the latest event per pair; the reaper and discovery synthesize events and
//! push them back through the core's streams.
//!
//! ## Example
//! ```rust
//! use corevisor::Event;
//!
//! let ev = Event::new()
//!     .with_host("web-1")
//!     .with_service("http latency")
//!     .with_metric(12.5)
//!     .with_time(1_700_000_000.0)
//!     .with_ttl(60.0)
//!     .with_attribute("region", "eu");
//!
//! let projected = ev.project(&["host", "service"]);
//! assert_eq!(projected.host.as_deref(), Some("web-1"));
//! assert!(projected.metric.is_none());
//! assert!(projected.attributes.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One monitoring observation.
///
/// Well-known fields are typed; anything else lives in `attributes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub host: Option<String>,
    pub service: Option<String>,
    pub state: Option<String>,
    pub description: Option<String>,
    pub metric: Option<f64>,
    /// Unix seconds.
    pub time: Option<f64>,
    /// Seconds this event stays valid after `time`.
    pub ttl: Option<f64>,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[inline]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[inline]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[inline]
    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    #[inline]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    #[inline]
    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[inline]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[inline]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Index key of this event.
    pub fn key(&self) -> EventKey {
        EventKey {
            host: self.host.clone().unwrap_or_default(),
            service: self.service.clone().unwrap_or_default(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns `true` when `state == "expired"`.
    pub fn is_expired_state(&self) -> bool {
        self.state.as_deref() == Some(EXPIRED)
    }

    /// Copies only the named fields into a new event.
    ///
    /// Names of well-known fields select the typed field; any other name
    /// selects the attribute of that name.
    pub fn project<K: AsRef<str>>(&self, keys: &[K]) -> Event {
        let mut out = Event::default();
        for key in keys {
            match key.as_ref() {
                "host" => out.host = self.host.clone(),
                "service" => out.service = self.service.clone(),
                "state" => out.state = self.state.clone(),
                "description" => out.description = self.description.clone(),
                "metric" => out.metric = self.metric,
                "time" => out.time = self.time,
                "ttl" => out.ttl = self.ttl,
                "tags" => out.tags = self.tags.clone(),
                other => {
                    if let Some(v) = self.attributes.get(other) {
                        out.attributes.insert(other.to_string(), v.clone());
                    }
                }
            }
        }
        out
    }
}

/// State written on events synthesized for expired index entries.
pub const EXPIRED: &str = "expired";

/// `(host, service)` identity of an indexed event.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub host: String,
    pub service: String,
}

impl EventKey {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.service)
    }
}

/// Opaque predicate handed to [`Index::search`](crate::index::Index::search).
///
/// The query language that produces these predicates is not part of this crate.
#[derive(Clone)]
pub struct Query(Arc<dyn Fn(&Event) -> bool + Send + Sync>);

impl Query {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Matches every event.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn host(host: impl Into<String>) -> Self {
        let host = host.into();
        Self::new(move |e| e.host.as_deref() == Some(host.as_str()))
    }

    pub fn service(service: impl Into<String>) -> Self {
        let service = service.into();
        Self::new(move |e| e.service.as_deref() == Some(service.as_str()))
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self::new(move |e| e.has_tag(&tag))
    }

    #[inline]
    pub fn matches(&self, event: &Event) -> bool {
        (self.0)(event)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Query(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        Event::new()
            .with_host("h1")
            .with_service("s1")
            .with_state("ok")
            .with_metric(1.0)
            .with_time(10.0)
            .with_ttl(60.0)
            .with_tag("prod")
            .with_attribute("dc", "ams")
    }

    #[test]
    fn test_project_keeps_only_named_fields() {
        let p = sample().project(&["host", "service"]);
        assert_eq!(
            p,
            Event {
                host: Some("h1".into()),
                service: Some("s1".into()),
                ..Event::default()
            }
        );
    }

    #[test]
    fn test_project_reads_attributes_by_name() {
        let p = sample().project(&["dc", "missing"]);
        assert_eq!(p.attributes.get("dc").map(String::as_str), Some("ams"));
        assert_eq!(p.attributes.len(), 1);
        assert!(p.host.is_none());
    }

    #[test]
    fn test_key_defaults_missing_parts_to_empty() {
        let k = Event::new().with_service("s").key();
        assert_eq!(k, EventKey::new("", "s"));
        assert_eq!(k.to_string(), "/s");
    }

    #[test]
    fn test_queries_match_fields() {
        let ev = sample();
        assert!(Query::all().matches(&ev));
        assert!(Query::host("h1").matches(&ev));
        assert!(!Query::host("h2").matches(&ev));
        assert!(Query::service("s1").matches(&ev));
        assert!(Query::tagged("prod").matches(&ev));
        assert!(!Query::tagged("dev").matches(&ev));
    }
}
