//! Client IP extraction.
//!
//! The configured header is read as one atomic value. No comma splitting,
//! no fallback headers, no peer address.

use std::collections::BTreeSet;

use axum::http::{HeaderMap, HeaderName};

/// Collect the distinct candidate client IPs carried by `header`.
///
/// Returns an empty set when the header is missing or blank. Values that are
/// not valid UTF-8 are kept (lossily decoded) so they fail later as an
/// unparsable address instead of vanishing.
pub fn extract_ips(headers: &HeaderMap, header: &HeaderName) -> BTreeSet<String> {
    let mut ips = BTreeSet::new();

    if let Some(value) = headers.get(header) {
        let raw = String::from_utf8_lossy(value.as_bytes());
        let ip = raw.trim();
        if !ip.is_empty() {
            ips.insert(ip.to_string());
        }
    }

    ips
}
