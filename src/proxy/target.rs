//! Target normalization
//!
//! Turns a request destination (IP literal, domain or URL) into the stable key
//! used for per-proxy usage lookups.

use std::net::{IpAddr, Ipv4Addr};

use url::{Host, Url};

use crate::error::{CyclerError, Result};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Validate a target and reduce it to its canonical hostname.
///
/// `http://www.example.com/path`, `www.example.com` and `example.com` all map
/// to `example.com`. IP literals map to their canonical textual form.
pub fn normalize_target(target: &str) -> Result<String> {
    let target = target.trim();
    if target.is_empty() {
        return Err(invalid(target));
    }

    if let Some(ip) = parse_ip_literal(target) {
        return Ok(ip.to_string());
    }

    if has_scheme(target) {
        let url = Url::parse(target).map_err(|_| invalid(target))?;
        return match url.host() {
            Some(Host::Domain(domain)) if is_valid_domain(domain) => Ok(canonical_domain(domain)),
            Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
            Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
            _ => Err(invalid(target)),
        };
    }

    // Scheme-less input such as `example.com:8080/path`
    let url = Url::parse(&format!("http://{}", target)).map_err(|_| invalid(target))?;
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid(target));
    }

    match url.host() {
        Some(Host::Domain(domain)) if is_valid_domain(domain) => Ok(canonical_domain(domain)),
        // The WHATWG parser accepts shorthand like `123` as 0.0.0.123; only take
        // addresses that were written out in full.
        Some(Host::Ipv4(ip)) if target.starts_with(&ip.to_string()) => Ok(ip.to_string()),
        _ => Err(invalid(target)),
    }
}

/// Check whether `host` is a syntactically valid domain name.
///
/// Requires at least two labels and a non-numeric top-level label, so dotted
/// quads such as `256.1.1.1` are never mistaken for domains.
pub fn is_valid_domain(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    let tld_is_numeric = labels
        .last()
        .map(|tld| tld.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(true);

    valid_labels && !tld_is_numeric
}

/// Check whether `host` is an IPv4 address in dotted-quad form
pub fn is_ipv4(host: &str) -> bool {
    host.parse::<Ipv4Addr>().is_ok()
}

/// Whether `target` starts with `scheme://`, as opposed to merely containing
/// `://` somewhere in its path or query
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };

    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_ip_literal(target: &str) -> Option<IpAddr> {
    let unbracketed = target
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(target);
    unbracketed.parse::<IpAddr>().ok()
}

fn canonical_domain(domain: &str) -> String {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();

    let mut host = domain.as_str();
    while let Some(rest) = host.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        host = rest;
    }

    host.to_string()
}

fn invalid(target: &str) -> CyclerError {
    CyclerError::InvalidTarget(format!(
        "`{}` must be an IP address, a domain or a URL",
        target
    ))
}
