//! Proxy selection
//!
//! This module provides:
//! - Target normalization into usage-map keys
//! - The per-target least-recently-used proxy pool
//! - A lock-guarded pool handle for concurrent workers

pub mod pool;
pub mod shared;
pub mod target;

pub use pool::ProxyPool;
pub use shared::SharedProxyPool;
pub use target::normalize_target;
