//! ASN filter orchestration.
//!
//! # Responsibilities
//! - Validate filter configuration once, at construction
//! - Pick the lookup source (database-backed or absent)
//! - Classify each candidate IP of a request and render a verdict
//!
//! # Design Decisions
//! - State (disabled / degraded / active) is fixed at construction
//! - A missing database degrades to allow-all, it never fails construction
//! - Lookup failures are per-IP and never deny a request
//! - The instance is immutable; reconfiguration builds a new one

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, HeaderName};
use serde::Serialize;

use crate::asn::{self, AsnLookup, AsnRecord};
use crate::config::{EnforcementMode, FilterConfig};
use crate::observability::metrics;
use crate::security::error::{FilterError, LookupFailure};
use crate::security::extractor::extract_ips;
use crate::security::policy::{AsnPolicy, Decision, PolicyMode};

/// Shared, swappable filter used by the HTTP layer.
pub type FilterHandle = Arc<ArcSwap<AsnFilter>>;

/// Operating state of a filter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterState {
    /// Filtering switched off; every request passes untouched.
    Disabled,
    /// No usable database; nothing can be classified.
    Degraded,
    /// Database loaded and policy enforced.
    Active,
}

/// An IP that was successfully classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub ip: IpAddr,
    pub record: AsnRecord,
}

/// Result of checking one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Filter disabled; nothing was inspected.
    Skipped,
    /// No candidate IP was denied. Carries the last classified IP, if any.
    Allowed(Option<Classification>),
    /// A candidate IP's ASN was rejected by policy.
    Denied(Classification),
}

/// The ASN request filter.
#[derive(Debug)]
pub struct AsnFilter {
    name: String,
    policy: AsnPolicy,
    header: HeaderName,
    enforcement: EnforcementMode,
    database_path: PathBuf,
    lookup: Arc<dyn AsnLookup>,
    state: FilterState,
}

impl AsnFilter {
    /// Build a filter from configuration, opening the database if present.
    pub fn new(config: &FilterConfig) -> Result<Self, FilterError> {
        let policy = AsnPolicy::new(&config.allowed_asns, &config.disallowed_asns)?;
        let header = parse_header(&config.header)?;

        if !config.enabled {
            tracing::info!(filter = %config.name, "ASN filter disabled");
            return Ok(Self::assemble(config, policy, header, Arc::new(asn::AbsentLookup), FilterState::Disabled));
        }

        let lookup = asn::open_or_absent(&config.database_path);
        let state = if lookup.is_available() {
            FilterState::Active
        } else {
            FilterState::Degraded
        };

        let filter = Self::assemble(config, policy, header, lookup, state);
        filter.log_ready();
        Ok(filter)
    }

    /// Build a filter around an already constructed lookup source.
    pub fn with_lookup(config: &FilterConfig, lookup: Arc<dyn AsnLookup>) -> Result<Self, FilterError> {
        let policy = AsnPolicy::new(&config.allowed_asns, &config.disallowed_asns)?;
        let header = parse_header(&config.header)?;

        let state = if !config.enabled {
            FilterState::Disabled
        } else if lookup.is_available() {
            FilterState::Active
        } else {
            FilterState::Degraded
        };

        Ok(Self::assemble(config, policy, header, lookup, state))
    }

    fn assemble(
        config: &FilterConfig,
        policy: AsnPolicy,
        header: HeaderName,
        lookup: Arc<dyn AsnLookup>,
        state: FilterState,
    ) -> Self {
        Self {
            name: config.name.clone(),
            policy,
            header,
            enforcement: config.enforcement,
            database_path: config.database_path.clone(),
            lookup,
            state,
        }
    }

    fn log_ready(&self) {
        tracing::info!(
            filter = %self.name,
            state = ?self.state,
            policy = ?self.policy.mode(),
            header = %self.header,
            enforcement = ?self.enforcement,
            database = %self.database_path.display(),
            "ASN filter initialized"
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn enforcement(&self) -> EnforcementMode {
        self.enforcement
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn policy(&self) -> &AsnPolicy {
        &self.policy
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Resolve a raw IP string to its ASN record.
    pub fn lookup(&self, ip: &str) -> Result<(IpAddr, AsnRecord), FilterError> {
        let addr: IpAddr = ip.parse().map_err(|_| FilterError::LookupFailed {
            ip: ip.to_string(),
            reason: LookupFailure::InvalidAddress,
        })?;

        let record = self.lookup.lookup(addr).map_err(|e| FilterError::LookupFailed {
            ip: ip.to_string(),
            reason: e.into(),
        })?;

        Ok((addr, record))
    }

    /// Check a single IP against the policy.
    ///
    /// Returns the classification when admitted, `NotAllowed` when the
    /// policy denies its ASN and `LookupFailed` when it cannot be classified.
    pub fn check_ip(&self, ip: &str) -> Result<Classification, FilterError> {
        let (addr, record) = self.lookup(ip)?;

        match self.policy.evaluate(record.asn) {
            Decision::Allow => Ok(Classification { ip: addr, record }),
            Decision::Deny => Err(FilterError::NotAllowed {
                ip: ip.to_string(),
                record,
            }),
        }
    }

    /// Check every candidate IP carried by the request headers.
    ///
    /// Stops at the first denied IP. Unclassifiable IPs are logged and skipped.
    pub fn check_headers(&self, headers: &HeaderMap) -> Verdict {
        if self.state == FilterState::Disabled {
            return Verdict::Skipped;
        }

        let host = headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        let mut classified = None;
        for ip in extract_ips(headers, &self.header) {
            let (addr, record) = match self.lookup(&ip) {
                Ok(found) => found,
                Err(FilterError::LookupFailed { ip, reason }) => {
                    metrics::record_lookup_failure(reason.kind());
                    tracing::debug!(filter = %self.name, host = %host, ip = %ip, reason = %reason, "lookup failed");
                    continue;
                }
                Err(e) => {
                    tracing::error!(filter = %self.name, host = %host, error = %e, "unexpected filter error");
                    continue;
                }
            };

            match self.policy.evaluate(record.asn) {
                Decision::Allow => {
                    tracing::trace!(filter = %self.name, ip = %ip, record = %record, "ASN admitted");
                    classified = Some(Classification { ip: addr, record });
                }
                Decision::Deny => {
                    tracing::warn!(
                        filter = %self.name,
                        host = %host,
                        ip = %ip,
                        asn = record.asn,
                        organization = %record.organization,
                        "access denied"
                    );
                    metrics::record_decision("deny");
                    return Verdict::Denied(Classification { ip: addr, record });
                }
            }
        }

        metrics::record_decision("allow");
        Verdict::Allowed(classified)
    }

    /// Summary for the status endpoint.
    pub fn status(&self) -> FilterStatus {
        FilterStatus {
            name: self.name.clone(),
            state: self.state,
            policy: self.policy.mode(),
            header: self.header.to_string(),
            enforcement: self.enforcement,
            database_path: self.database_path.display().to_string(),
        }
    }
}

/// Serializable view of a filter instance.
#[derive(Debug, Clone, Serialize)]
pub struct FilterStatus {
    pub name: String,
    pub state: FilterState,
    pub policy: PolicyMode,
    pub header: String,
    pub enforcement: EnforcementMode,
    pub database_path: String,
}

/// Rebuild the filter from `config` and publish it through `handle`.
///
/// On failure the previously published filter stays in place.
pub fn reload(handle: &FilterHandle, config: &FilterConfig) -> Result<FilterState, FilterError> {
    match AsnFilter::new(config) {
        Ok(filter) => {
            let state = filter.state();
            handle.store(Arc::new(filter));
            metrics::record_reload("success");
            Ok(state)
        }
        Err(e) => {
            metrics::record_reload("failure");
            Err(e)
        }
    }
}

fn parse_header(header: &str) -> Result<HeaderName, FilterError> {
    HeaderName::from_bytes(header.trim().as_bytes()).map_err(|_| FilterError::InvalidHeader(header.to_string()))
}
