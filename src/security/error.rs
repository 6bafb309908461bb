//! Filter error definitions.

use thiserror::Error;

use crate::asn::{AsnRecord, LookupError};

/// Errors surfaced by the ASN filter.
///
/// Only the construction errors are fatal. `LookupFailed` and `NotAllowed`
/// are per-IP outcomes reported to the orchestrator.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Allow-list and deny-list were both configured.
    #[error("either allowed asn or disallowed asn could be set at once")]
    ConflictingPolicy,

    /// An ASN list entry is not a canonical decimal number.
    #[error("invalid asn '{0}': expected a decimal number such as 35236")]
    InvalidAsn(String),

    /// The configured header name is not a valid HTTP header name.
    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    /// The IP could not be parsed or classified.
    #[error("lookup of {ip} failed: {reason}")]
    LookupFailed { ip: String, reason: LookupFailure },

    /// The IP's ASN is rejected by policy.
    #[error("not allowed: {ip} ({record})")]
    NotAllowed { ip: String, record: AsnRecord },
}

/// Why a candidate IP could not be classified.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("not a valid IP address")]
    InvalidAddress,

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl LookupFailure {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupFailure::InvalidAddress => "invalid_ip",
            LookupFailure::Lookup(e) => e.kind(),
        }
    }
}
