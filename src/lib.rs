//! Proxy Cycler - per-target proxy rotation
//!
//! Keeps a pool of HTTP/HTTPS proxies and picks, for each destination, the
//! proxy that was least recently used against that destination.
//!
//! ## Features
//!
//! - Deduplicated pool keyed by host, port and scheme
//! - Cold-start-first, then least-recently-used selection per target
//! - Target normalization (`http://www.example.com/a` and `example.com` match)
//! - Lock-guarded shared pool with atomic checkout for concurrent workers
//! - Environment-driven configuration and tracing setup
//!
//! ```
//! use proxy_cycler::{ProxyPool, ProxySpec};
//!
//! let mut pool = ProxyPool::with_proxies(vec![
//!     ProxySpec::new("10.0.0.1", 8080),
//!     ProxySpec::new("10.0.0.2", 8080),
//! ])?;
//!
//! let proxy = pool.select("https://example.com/login")?.expect("pool is not empty");
//! assert_eq!(proxy.to_url(), "http://10.0.0.1:8080");
//!
//! pool.mark_used(ProxySpec::new("10.0.0.1", 8080), "example.com", None)?;
//! let proxy = pool.select("example.com")?.expect("pool is not empty");
//! assert_eq!(proxy.host(), "10.0.0.2");
//! # Ok::<(), proxy_cycler::CyclerError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;

pub use config::Config;
pub use error::{CyclerError, Result};
pub use models::{parse_timestamp, Credentials, PortValue, Proxy, ProxyKey, ProxySpec, Scheme};
pub use proxy::{normalize_target, ProxyPool, SharedProxyPool};
