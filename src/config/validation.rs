//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject mutually exclusive allow/deny lists
//! - Check ASN identifiers, header names and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::{FilterConfig, GatewayConfig};
use crate::security::policy::is_decimal_asn;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Both `allowed_asns` and `disallowed_asns` are set.
    ConflictingPolicy,
    /// An ASN entry is not a decimal u32.
    InvalidAsn { list: &'static str, value: String },
    InvalidHeader(String),
    InvalidAddress { field: &'static str, value: String },
    ZeroValue(&'static str),
    MissingLicenseKey,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ConflictingPolicy => {
                write!(f, "either allowed_asns or disallowed_asns can be set, not both")
            }
            ValidationError::InvalidAsn { list, value } => {
                write!(f, "{}: '{}' is not a valid ASN", list, value)
            }
            ValidationError::InvalidHeader(h) => write!(f, "filter.header: '{}' is not a valid header name", h),
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{}: '{}' is not a valid socket address", field, value)
            }
            ValidationError::ZeroValue(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::MissingLicenseKey => write!(f, "refresh.license_key is required when refresh is enabled"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a full gateway configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_filter(&config.filter);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_connections"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("listener.request_timeout_secs"));
    }
    if config.upstream.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "upstream.address",
            value: config.upstream.address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.refresh.enabled {
        if config.refresh.interval_secs == 0 {
            errors.push(ValidationError::ZeroValue("refresh.interval_secs"));
        }
        if config.refresh.timeout_secs == 0 {
            errors.push(ValidationError::ZeroValue("refresh.timeout_secs"));
        }
        if config.refresh.license_key.as_deref().filter(|k| !k.trim().is_empty()).is_none() {
            errors.push(ValidationError::MissingLicenseKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the `[filter]` table.
pub fn validate_filter(filter: &FilterConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !filter.allowed_asns.is_empty() && !filter.disallowed_asns.is_empty() {
        errors.push(ValidationError::ConflictingPolicy);
    }

    for (list, entries) in [
        ("filter.allowed_asns", &filter.allowed_asns),
        ("filter.disallowed_asns", &filter.disallowed_asns),
    ] {
        for value in entries {
            if !is_decimal_asn(value.trim()) {
                errors.push(ValidationError::InvalidAsn {
                    list,
                    value: value.clone(),
                });
            }
        }
    }

    if filter.header.is_empty() || HeaderName::from_bytes(filter.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeader(filter.header.clone()));
    }

    errors
}
