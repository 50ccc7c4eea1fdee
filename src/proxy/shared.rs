//! Thread-safe proxy pool handle
//!
//! Every operation takes the pool lock for its whole duration. Proxies are
//! handed out as owned snapshots so no lock is held by callers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::pool::ProxyPool;
use crate::error::Result;
use crate::models::{PortValue, Proxy, ProxySpec, Scheme};

/// Cloneable handle to a proxy pool shared between workers
#[derive(Debug, Clone, Default)]
pub struct SharedProxyPool {
    inner: Arc<Mutex<ProxyPool>>,
}

impl SharedProxyPool {
    pub fn new(pool: ProxyPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn add(&self, spec: ProxySpec) -> Result<Proxy> {
        self.inner.lock().add(spec).cloned()
    }

    pub fn remove(&self, host: &str, port: impl Into<PortValue>, scheme: Scheme) -> bool {
        self.inner.lock().remove(host, port, scheme)
    }

    pub fn select(&self, target: &str) -> Result<Option<Proxy>> {
        Ok(self.inner.lock().select(target)?.cloned())
    }

    pub fn mark_used(
        &self,
        spec: ProxySpec,
        target: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Proxy> {
        self.inner.lock().mark_used(spec, target, at).cloned()
    }

    /// Select a proxy and record its use while holding the lock
    ///
    /// Two workers checking out the same target concurrently never receive the
    /// same least-used proxy, which a separate `select` then `mark_used` pair
    /// cannot guarantee.
    pub fn checkout(&self, target: &str, at: Option<DateTime<Utc>>) -> Result<Option<Proxy>> {
        Ok(self.inner.lock().checkout(target, at)?.cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of every proxy in insertion order
    pub fn snapshot(&self) -> Vec<Proxy> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Run `f` with exclusive access to the pool
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut ProxyPool) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}

impl From<ProxyPool> for SharedProxyPool {
    fn from(pool: ProxyPool) -> Self {
        Self::new(pool)
    }
}
