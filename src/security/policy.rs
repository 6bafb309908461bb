//! ASN admission policy.
//!
//! # Responsibilities
//! - Hold the allow-list or deny-list of ASN identifiers
//! - Render an Allow/Deny decision for an ASN
//!
//! # Design Decisions
//! - Lists are mutually exclusive; construction fails if both are set
//! - Identifiers are canonical decimal strings, checked at construction
//! - Evaluation is a pure function of (asn, policy)

use std::collections::HashSet;

use serde::Serialize;

use crate::security::error::FilterError;

/// Outcome of evaluating an ASN against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// Which list, if any, drives the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    AllowList,
    DenyList,
    Unrestricted,
}

/// Immutable allow/deny ASN policy.
#[derive(Debug, Clone, Default)]
pub struct AsnPolicy {
    allowed: HashSet<String>,
    denied: HashSet<String>,
}

impl AsnPolicy {
    /// Build a policy from the configured lists.
    pub fn new<A, D, S>(allowed: A, denied: D) -> Result<Self, FilterError>
    where
        A: IntoIterator<Item = S>,
        D: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = parse_entries(allowed)?;
        let denied = parse_entries(denied)?;

        if !allowed.is_empty() && !denied.is_empty() {
            return Err(FilterError::ConflictingPolicy);
        }

        Ok(Self { allowed, denied })
    }

    pub fn mode(&self) -> PolicyMode {
        if !self.allowed.is_empty() {
            PolicyMode::AllowList
        } else if !self.denied.is_empty() {
            PolicyMode::DenyList
        } else {
            PolicyMode::Unrestricted
        }
    }

    /// Decide whether `asn` is admitted.
    pub fn evaluate(&self, asn: u32) -> Decision {
        let key = asn.to_string();
        match self.mode() {
            PolicyMode::AllowList if self.allowed.contains(&key) => Decision::Allow,
            PolicyMode::AllowList => Decision::Deny,
            PolicyMode::DenyList if self.denied.contains(&key) => Decision::Deny,
            PolicyMode::DenyList | PolicyMode::Unrestricted => Decision::Allow,
        }
    }
}

/// Trimmed entries, each required to be a canonical decimal ASN.
fn parse_entries<I, S>(entries: I) -> Result<HashSet<String>, FilterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| {
            let entry = entry.as_ref().trim();
            if is_decimal_asn(entry) {
                Ok(entry.to_string())
            } else {
                Err(FilterError::InvalidAsn(entry.to_string()))
            }
        })
        .collect()
}

/// Plain decimal digits that fit in a u32. Leading zeros and signs are
/// rejected since they would never match `asn.to_string()`.
pub fn is_decimal_asn(value: &str) -> bool {
    let canonical = value.bytes().all(|b| b.is_ascii_digit()) && !(value.len() > 1 && value.starts_with('0'));
    canonical && value.parse::<u32>().is_ok()
}

/// Free-function form of [`AsnPolicy::evaluate`].
pub fn evaluate(asn: u32, policy: &AsnPolicy) -> Decision {
    policy.evaluate(asn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_both_lists_conflict() {
        let err = AsnPolicy::new(["35236"], ["206948"]).unwrap_err();
        assert!(matches!(err, FilterError::ConflictingPolicy));
    }

    #[test]
    fn test_allow_list() {
        let policy = AsnPolicy::new(["35236"], NONE).unwrap();
        assert_eq!(policy.mode(), PolicyMode::AllowList);

        assert_eq!(evaluate(35236, &policy), Decision::Allow);
        for other in [0, 1, 206948, 3523, 352360, u32::MAX] {
            assert_eq!(evaluate(other, &policy), Decision::Deny, "asn {other}");
        }
    }

    #[test]
    fn test_deny_list() {
        let policy = AsnPolicy::new(NONE, ["206948"]).unwrap();
        assert_eq!(policy.mode(), PolicyMode::DenyList);

        assert_eq!(evaluate(206948, &policy), Decision::Deny);
        for other in [0, 1, 35236, 20694, u32::MAX] {
            assert_eq!(evaluate(other, &policy), Decision::Allow, "asn {other}");
        }
    }

    #[test]
    fn test_empty_policy_allows_everything() {
        let policy = AsnPolicy::new(NONE, NONE).unwrap();
        assert_eq!(policy.mode(), PolicyMode::Unrestricted);
        for asn in [0, 13335, 35236, 206948, u32::MAX] {
            assert_eq!(evaluate(asn, &policy), Decision::Allow);
        }
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let policy = AsnPolicy::new(NONE, ["13335", "15169"]).unwrap();
        let first: Vec<_> = (13330..13340).map(|asn| evaluate(asn, &policy)).collect();
        for _ in 0..3 {
            let again: Vec<_> = (13330..13340).map(|asn| evaluate(asn, &policy)).collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_blank_entry_rejected() {
        let err = AsnPolicy::new([" "], NONE).unwrap_err();
        assert!(matches!(err, FilterError::InvalidAsn(ref v) if v.is_empty()));
    }

    #[test]
    fn test_prefixed_entry_rejected() {
        let err = AsnPolicy::new(NONE, ["AS35236"]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidAsn(ref v) if v == "AS35236"));
        assert!(AsnPolicy::new(NONE, ["035236"]).is_err());
        assert!(AsnPolicy::new(["4294967296"], NONE).is_err());
    }

    #[test]
    fn test_asn_format() {
        assert!(is_decimal_asn("0"));
        assert!(is_decimal_asn("35236"));
        assert!(is_decimal_asn("4294967295"));
        assert!(!is_decimal_asn(""));
        assert!(!is_decimal_asn("+1"));
        assert!(!is_decimal_asn("035236"));
        assert!(!is_decimal_asn(" 35236"));
    }

    #[test]
    fn test_entries_are_trimmed() {
        let policy = AsnPolicy::new([" 35236 "], NONE).unwrap();
        assert_eq!(policy.evaluate(35236), Decision::Allow);
    }
}
