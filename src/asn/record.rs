//! ASN lookup result.

use std::fmt;

use serde::Serialize;

/// Autonomous system that announces the network an IP belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsnRecord {
    /// Autonomous System Number.
    pub asn: u32,
    /// Registered organization name (may be empty).
    pub organization: String,
}

impl AsnRecord {
    pub fn new(asn: u32, organization: impl Into<String>) -> Self {
        Self {
            asn,
            organization: organization.into(),
        }
    }
}

impl fmt::Display for AsnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.organization.is_empty() {
            write!(f, "AS{}", self.asn)
        } else {
            write!(f, "AS{} ({})", self.asn, self.organization)
        }
    }
}
