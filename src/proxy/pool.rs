//! Per-target least-recently-used proxy pool
//!
//! Selection prefers a proxy that has never been used against the target,
//! scanning in insertion order. Once every proxy has been used against it, the
//! proxy with the oldest usage wins, with ties going to the earliest inserted.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{PortValue, Proxy, ProxyKey, ProxySpec, Scheme};
use crate::proxy::target::normalize_target;

/// Ordered, deduplicated collection of proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<Proxy>,
    /// Cap on the number of targets remembered per proxy (unbounded if unset)
    max_tracked_targets: Option<usize>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from a list of proxy specs
    ///
    /// Any invalid spec aborts construction. Duplicate identities collapse
    /// into the first occurrence.
    pub fn with_proxies<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProxySpec>,
    {
        let mut pool = Self::new();
        for spec in specs {
            pool.add(spec)?;
        }
        info!("Loaded {} proxies", pool.len());
        Ok(pool)
    }

    /// Limit how many targets each proxy remembers
    ///
    /// When a proxy exceeds the limit its oldest targets are forgotten, which
    /// makes it a cold-start candidate for them again. A limit of zero is
    /// raised to one.
    pub fn with_max_tracked_targets(mut self, max: usize) -> Self {
        let max = max.max(1);
        for proxy in &mut self.proxies {
            proxy.trim_usage(max, None);
        }
        self.max_tracked_targets = Some(max);
        self
    }

    pub fn max_tracked_targets(&self) -> Option<usize> {
        self.max_tracked_targets
    }

    /// Add a proxy, or return the existing one with the same identity
    ///
    /// An existing proxy is returned unchanged; its credentials are not
    /// overwritten.
    pub fn add(&mut self, spec: ProxySpec) -> Result<&Proxy> {
        let idx = self.add_index(spec)?;
        Ok(&self.proxies[idx])
    }

    /// Remove a proxy, returning whether one was removed
    pub fn remove(&mut self, host: &str, port: impl Into<PortValue>, scheme: Scheme) -> bool {
        let Ok(key) = ProxyKey::new(host, port, scheme) else {
            return false;
        };

        match self.position(&key) {
            Some(idx) => {
                self.proxies.remove(idx);
                debug!(proxy = %key, "Removed proxy");
                true
            }
            None => false,
        }
    }

    /// Record that a proxy was used against `target`
    ///
    /// Unknown proxies are added to the pool first, so usage reports are never
    /// dropped. The target is validated before anything is added.
    pub fn mark_used(
        &mut self,
        spec: ProxySpec,
        target: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<&Proxy> {
        let target = normalize_target(target)?;
        let idx = self.add_index(spec)?;
        self.record_at(idx, target, at.unwrap_or_else(Utc::now));
        Ok(&self.proxies[idx])
    }

    /// Pick the proxy to use next for `target`
    ///
    /// Returns `Ok(None)` when the pool is empty.
    pub fn select(&self, target: &str) -> Result<Option<&Proxy>> {
        let target = normalize_target(target)?;
        let selected = self.select_index(&target).map(|idx| &self.proxies[idx]);

        if let Some(proxy) = selected {
            debug!(proxy = %proxy.key(), target = %target, "Selected proxy");
        }
        Ok(selected)
    }

    /// Select a proxy for `target` and record the use in one step
    pub fn checkout(
        &mut self,
        target: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<&Proxy>> {
        let target = normalize_target(target)?;
        let Some(idx) = self.select_index(&target) else {
            return Ok(None);
        };

        debug!(proxy = %self.proxies[idx].key(), target = %target, "Checked out proxy");
        self.record_at(idx, target, at.unwrap_or_else(Utc::now));
        Ok(Some(&self.proxies[idx]))
    }

    pub fn get(&self, host: &str, port: impl Into<PortValue>, scheme: Scheme) -> Option<&Proxy> {
        let key = ProxyKey::new(host, port, scheme).ok()?;
        self.position(&key).map(|idx| &self.proxies[idx])
    }

    pub fn contains(&self, host: &str, port: impl Into<PortValue>, scheme: Scheme) -> bool {
        self.get(host, port, scheme).is_some()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Iterate proxies in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Proxy> {
        self.proxies.iter()
    }

    pub fn clear(&mut self) {
        self.proxies.clear();
    }

    fn add_index(&mut self, spec: ProxySpec) -> Result<usize> {
        let proxy = Proxy::new(spec)?;
        if let Some(idx) = self.position(proxy.key()) {
            return Ok(idx);
        }

        debug!(proxy = %proxy, "Added proxy");
        self.proxies.push(proxy);
        Ok(self.proxies.len() - 1)
    }

    fn position(&self, key: &ProxyKey) -> Option<usize> {
        self.proxies.iter().position(|p| p.key() == key)
    }

    fn record_at(&mut self, idx: usize, target: String, at: DateTime<Utc>) {
        let proxy = &mut self.proxies[idx];
        proxy.record_normalized(target.clone(), at);
        if let Some(max) = self.max_tracked_targets {
            proxy.trim_usage(max, Some(&target));
        }
    }

    fn select_index(&self, target: &str) -> Option<usize> {
        let mut oldest: Option<(usize, DateTime<Utc>)> = None;

        for (idx, proxy) in self.proxies.iter().enumerate() {
            match proxy.used_at(target) {
                None => return Some(idx),
                Some(at) => {
                    // Strict comparison keeps the earliest proxy on ties
                    if oldest.map_or(true, |(_, min)| at < min) {
                        oldest = Some((idx, at));
                    }
                }
            }
        }

        oldest.map(|(idx, _)| idx)
    }
}

impl<'a> IntoIterator for &'a ProxyPool {
    type Item = &'a Proxy;
    type IntoIter = std::slice::Iter<'a, Proxy>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CyclerError;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn spec(host: &str, port: u16) -> ProxySpec {
        ProxySpec::new(host, port)
    }

    fn test_pool() -> ProxyPool {
        ProxyPool::with_proxies(vec![
            spec("10.0.0.1", 8081),
            spec("10.0.0.2", 8082),
            spec("10.0.0.3", 8083),
        ])
        .unwrap()
    }

    fn selected_port(pool: &ProxyPool, target: &str) -> u16 {
        pool.select(target).unwrap().unwrap().port()
    }

    #[test]
    fn test_select_empty_pool() {
        let pool = ProxyPool::new();
        assert!(pool.select("example.com").unwrap().is_none());
    }

    #[test]
    fn test_select_invalid_target() {
        let pool = test_pool();
        let err = pool.select("not a target").unwrap_err();
        assert!(matches!(err, CyclerError::InvalidTarget(_)));
    }

    #[test]
    fn test_cold_start_returns_first_inserted() {
        let pool = test_pool();
        assert_eq!(selected_port(&pool, "example.com"), 8081);
        // Stable without recorded usage
        assert_eq!(selected_port(&pool, "example.com"), 8081);
    }

    #[test]
    fn test_cold_start_beats_older_usage() {
        let mut pool = test_pool();
        pool.mark_used(spec("10.0.0.1", 8081), "example.com", Some(ts(1)))
            .unwrap();
        pool.mark_used(spec("10.0.0.3", 8083), "example.com", Some(ts(2)))
            .unwrap();

        // 8082 has never been used against the target
        assert_eq!(selected_port(&pool, "example.com"), 8082);
    }

    #[test]
    fn test_lru_returns_oldest() {
        let mut pool = test_pool();
        pool.mark_used(spec("10.0.0.2", 8082), "example.com", Some(ts(1)))
            .unwrap();
        pool.mark_used(spec("10.0.0.3", 8083), "example.com", Some(ts(2)))
            .unwrap();
        pool.mark_used(spec("10.0.0.1", 8081), "example.com", Some(ts(3)))
            .unwrap();

        assert_eq!(selected_port(&pool, "example.com"), 8082);
    }

    #[test]
    fn test_lru_tie_goes_to_lowest_index() {
        let mut pool = test_pool();
        pool.mark_used(spec("10.0.0.1", 8081), "example.com", Some(ts(5)))
            .unwrap();
        pool.mark_used(spec("10.0.0.2", 8082), "example.com", Some(ts(2)))
            .unwrap();
        pool.mark_used(spec("10.0.0.3", 8083), "example.com", Some(ts(2)))
            .unwrap();

        assert_eq!(selected_port(&pool, "example.com"), 8082);
    }

    #[test]
    fn test_usage_is_per_target() {
        let mut pool = test_pool();
        pool.mark_used(spec("10.0.0.1", 8081), "example.com", Some(ts(1)))
            .unwrap();

        assert_eq!(selected_port(&pool, "example.com"), 8082);
        assert_eq!(selected_port(&pool, "example.org"), 8081);
    }

    #[test]
    fn test_equivalent_targets_share_usage() {
        let mut pool = test_pool();
        pool.mark_used(
            spec("10.0.0.1", 8081),
            "http://www.example.com/login",
            Some(ts(1)),
        )
        .unwrap();

        assert_eq!(selected_port(&pool, "example.com"), 8082);
        assert_eq!(selected_port(&pool, "https://example.com/other"), 8082);
    }

    #[test]
    fn test_add_duplicate_returns_original() {
        let mut pool = ProxyPool::new();
        pool.add(spec("proxy.example.com", 8080).with_auth("alice:one"))
            .unwrap();

        let existing = pool
            .add(spec("PROXY.example.com", 8080).with_auth("bob:two"))
            .unwrap();
        assert_eq!(existing.credentials().unwrap().username, "alice");
        assert_eq!(pool.len(), 1);

        // Port given as a string is the same identity
        pool.add(ProxySpec::new("proxy.example.com", "8080")).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_add_scheme_is_part_of_identity() {
        let mut pool = ProxyPool::new();
        pool.add(spec("10.0.0.1", 8080)).unwrap();
        pool.add(spec("10.0.0.1", 8080).with_scheme(Scheme::Https))
            .unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_add_invalid_proxy() {
        let mut pool = ProxyPool::new();
        let err = pool.add(ProxySpec::new("256.1.1.1", 8080)).unwrap_err();
        assert!(matches!(err, CyclerError::InvalidProxy(_)));
        assert!(pool.is_empty());

        assert!(pool.add(ProxySpec::new("proxy.example.com", 8080)).is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_with_proxies_aborts_on_invalid_entry() {
        let err = ProxyPool::with_proxies(vec![
            spec("10.0.0.1", 8081),
            ProxySpec::new("10.0.0.2", 0),
        ])
        .unwrap_err();
        assert!(matches!(err, CyclerError::InvalidProxy(_)));
    }

    #[test]
    fn test_with_proxies_collapses_duplicates() {
        let pool = ProxyPool::with_proxies(vec![
            spec("10.0.0.1", 8081),
            spec("10.0.0.1", 8081),
            spec("10.0.0.2", 8082),
        ])
        .unwrap();
        let ports: Vec<u16> = pool.iter().map(|p| p.port()).collect();
        assert_eq!(ports, vec![8081, 8082]);
    }

    #[test]
    fn test_remove() {
        let mut pool = test_pool();

        assert!(!pool.remove("10.0.0.9", 8081, Scheme::Http));
        assert!(!pool.remove("10.0.0.1", 8081, Scheme::Https));
        assert!(!pool.remove("10.0.0.1", "not-a-port", Scheme::Http));
        assert_eq!(pool.len(), 3);

        assert!(pool.remove("10.0.0.2", "8082", Scheme::Http));
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains("10.0.0.2", 8082, Scheme::Http));

        let ports: Vec<u16> = pool.iter().map(|p| p.port()).collect();
        assert_eq!(ports, vec![8081, 8083]);
    }

    #[test]
    fn test_mark_used_adds_unknown_proxy() {
        let mut pool = test_pool();
        let proxy = pool
            .mark_used(spec("10.0.0.4", 8084), "example.com", Some(ts(1)))
            .unwrap();
        assert_eq!(proxy.last_used("example.com").unwrap(), Some(ts(1)));
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.iter().last().unwrap().port(), 8084);
    }

    #[test]
    fn test_mark_used_failure_does_not_mutate() {
        let mut pool = test_pool();

        let err = pool
            .mark_used(spec("10.0.0.4", 8084), "not a target", Some(ts(1)))
            .unwrap_err();
        assert!(matches!(err, CyclerError::InvalidTarget(_)));
        assert_eq!(pool.len(), 3);

        let err = pool
            .mark_used(ProxySpec::new("256.1.1.1", 8084), "example.com", Some(ts(1)))
            .unwrap_err();
        assert!(matches!(err, CyclerError::InvalidProxy(_)));
        assert_eq!(pool.len(), 3);
        assert!(pool.iter().all(|p| p.used().is_empty()));
    }

    #[test]
    fn test_checkout_rotates_through_pool() {
        let mut pool = test_pool();
        let ports: Vec<u16> = (0..6)
            .map(|i| {
                pool.checkout("example.com", Some(ts(i)))
                    .unwrap()
                    .unwrap()
                    .port()
            })
            .collect();
        assert_eq!(ports, vec![8081, 8082, 8083, 8081, 8082, 8083]);
    }

    #[test]
    fn test_checkout_empty_pool() {
        let mut pool = ProxyPool::new();
        assert!(pool.checkout("example.com", None).unwrap().is_none());
    }

    #[test]
    fn test_get_and_clear() {
        let mut pool = test_pool();
        assert_eq!(pool.get("10.0.0.3", "8083", Scheme::Http).unwrap().port(), 8083);
        assert!(pool.get("10.0.0.3", 8083, Scheme::Https).is_none());
        assert!(pool.get("bogus host", 8083, Scheme::Http).is_none());

        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.select("example.com").unwrap().is_none());
    }

    #[test]
    fn test_max_tracked_targets_evicts_oldest() {
        let mut pool = ProxyPool::with_proxies(vec![spec("10.0.0.1", 8081), spec("10.0.0.2", 8082)])
            .unwrap()
            .with_max_tracked_targets(2);

        pool.mark_used(spec("10.0.0.1", 8081), "a.example.com", Some(ts(1)))
            .unwrap();
        pool.mark_used(spec("10.0.0.1", 8081), "b.example.com", Some(ts(2)))
            .unwrap();
        pool.mark_used(spec("10.0.0.1", 8081), "c.example.com", Some(ts(3)))
            .unwrap();

        let first = pool.get("10.0.0.1", 8081, Scheme::Http).unwrap();
        assert_eq!(first.used().len(), 2);
        assert_eq!(first.last_used("a.example.com").unwrap(), None);

        // Forgotten target makes the proxy a cold-start candidate again
        assert_eq!(selected_port(&pool, "a.example.com"), 8081);
        assert_eq!(selected_port(&pool, "c.example.com"), 8082);
    }

    #[test]
    fn test_max_tracked_targets_keeps_just_recorded_target() {
        let mut pool = ProxyPool::with_proxies(vec![spec("10.0.0.1", 8081), spec("10.0.0.2", 8082)])
            .unwrap()
            .with_max_tracked_targets(1);

        pool.mark_used(spec("10.0.0.1", 8081), "b.example.com", Some(ts(10)))
            .unwrap();
        // Older than the entry already tracked, but still the latest report
        let proxy = pool
            .mark_used(spec("10.0.0.1", 8081), "a.example.com", Some(ts(5)))
            .unwrap();
        assert_eq!(proxy.last_used("a.example.com").unwrap(), Some(ts(5)));
        assert_eq!(proxy.used().len(), 1);
        assert!(!proxy.used().contains_key("b.example.com"));

        assert_eq!(selected_port(&pool, "a.example.com"), 8082);
    }

    #[test]
    fn test_max_tracked_targets_zero_is_raised() {
        let pool = ProxyPool::new().with_max_tracked_targets(0);
        assert_eq!(pool.max_tracked_targets(), Some(1));
        assert_eq!(ProxyPool::new().max_tracked_targets(), None);
    }
}
