//! ASN lookup sources.
//!
//! # Responsibilities
//! - Open the MMDB file (plain or zstd-compressed)
//! - Resolve an IP address to its autonomous system
//! - Provide a stand-in source when no database is available

use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use maxminddb::{geoip2, MaxMindDBError, Reader};
use thiserror::Error;

use crate::asn::record::AsnRecord;

/// Errors produced while opening or querying an ASN database.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The IP is not covered by any network in the database.
    #[error("address not found: {0}")]
    AddressNotFound(IpAddr),

    /// A network matched but its record carries no ASN.
    #[error("record for {0} has no autonomous system number")]
    MissingAsn(IpAddr),

    /// No database is loaded.
    #[error("asn database unavailable")]
    DatabaseUnavailable,

    #[error("failed to read asn database {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decompress asn database {path}: {source}")]
    Decompress {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid asn database {path}: {source}")]
    Open {
        path: PathBuf,
        source: MaxMindDBError,
    },

    /// Any other reader error during a lookup (corrupt data section, decoding).
    #[error("asn database error: {0}")]
    Database(String),
}

impl LookupError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::AddressNotFound(_) => "not_found",
            LookupError::MissingAsn(_) => "missing_asn",
            LookupError::DatabaseUnavailable => "unavailable",
            LookupError::Io { .. } | LookupError::Decompress { .. } | LookupError::Open { .. } => "open",
            LookupError::Database(_) => "database",
        }
    }
}

/// Resolves IP addresses to autonomous systems.
///
/// Implementations must be cheap to call concurrently; they are shared
/// read-only across all in-flight requests.
pub trait AsnLookup: Send + Sync + fmt::Debug {
    fn lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError>;

    /// Whether this source is backed by real data.
    fn is_available(&self) -> bool {
        true
    }
}

/// Lookup source backed by a MaxMind GeoLite2/GeoIP2 ASN database.
pub struct MaxMindLookup {
    reader: Reader<Vec<u8>>,
    path: PathBuf,
}

impl MaxMindLookup {
    /// Path the database was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `database_type` from the MMDB metadata, e.g. `GeoLite2-ASN`.
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }

    /// Unix timestamp at which the database was built.
    pub fn build_epoch(&self) -> u64 {
        self.reader.metadata.build_epoch
    }
}

impl fmt::Debug for MaxMindLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindLookup")
            .field("path", &self.path)
            .field("database_type", &self.database_type())
            .field("build_epoch", &self.build_epoch())
            .finish()
    }
}

impl AsnLookup for MaxMindLookup {
    fn lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        match self.reader.lookup::<geoip2::Asn>(ip) {
            Ok(asn) => {
                let number = asn.autonomous_system_number.ok_or(LookupError::MissingAsn(ip))?;
                Ok(AsnRecord::new(
                    number,
                    asn.autonomous_system_organization.unwrap_or_default(),
                ))
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => Err(LookupError::AddressNotFound(ip)),
            Err(err) => Err(LookupError::Database(format!("lookup of {ip} failed: {err}"))),
        }
    }
}

/// Lookup source used when no database could be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsentLookup;

impl AsnLookup for AbsentLookup {
    fn lookup(&self, _ip: IpAddr) -> Result<AsnRecord, LookupError> {
        Err(LookupError::DatabaseUnavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Open the ASN database at `path`.
///
/// Files with a `.zst` extension are decompressed in memory first.
pub fn open(path: &Path) -> Result<MaxMindLookup, LookupError> {
    let compressed = path.extension().is_some_and(|ext| ext == "zst");

    let reader = if compressed {
        let raw = fs::read(path).map_err(|source| LookupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = zstd::decode_all(raw.as_slice()).map_err(|source| LookupError::Decompress {
            path: path.to_path_buf(),
            source,
        })?;
        Reader::from_source(content)
    } else {
        Reader::open_readfile(path)
    }
    .map_err(|source| LookupError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let lookup = MaxMindLookup {
        reader,
        path: path.to_path_buf(),
    };

    tracing::debug!(
        path = %path.display(),
        database_type = %lookup.database_type(),
        build_epoch = lookup.build_epoch(),
        "ASN database opened"
    );

    Ok(lookup)
}

/// Open the database if the file exists and is valid, otherwise fall back
/// to [`AbsentLookup`]. Never fails.
pub fn open_or_absent(path: &Path) -> Arc<dyn AsnLookup> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "ASN database not found, running without ASN data");
        return Arc::new(AbsentLookup);
    }

    match open(path) {
        Ok(lookup) => Arc::new(lookup),
        Err(e) => {
            tracing::error!(error = %e, "ASN database not initialized, running without ASN data");
            Arc::new(AbsentLookup)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/asn-test.mmdb");

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_lookup_known_networks() {
        let lookup = open(Path::new(FIXTURE)).unwrap();
        assert!(lookup.is_available());
        assert_eq!(lookup.database_type(), "GeoLite2-ASN");

        assert_eq!(
            lookup.lookup(ip("188.92.102.22")).unwrap(),
            AsnRecord::new(206948, "Example Denied Network")
        );
        assert_eq!(
            lookup.lookup(ip("1.159.255.255")).unwrap(),
            AsnRecord::new(1221, "Telstra Pty Ltd")
        );
        assert_eq!(lookup.lookup(ip("2001:db8::1")).unwrap().asn, 64496);
    }

    #[test]
    fn test_lookup_uncovered_address() {
        let lookup = open(Path::new(FIXTURE)).unwrap();

        for addr in ["10.0.0.1", "1.160.0.0", "2001:db9::1"] {
            assert!(
                matches!(lookup.lookup(ip(addr)), Err(LookupError::AddressNotFound(found)) if found == ip(addr)),
                "{addr}"
            );
        }
    }

    #[test]
    fn test_lookup_record_without_number() {
        let lookup = open(Path::new(FIXTURE)).unwrap();

        let err = lookup.lookup(ip("203.0.113.5")).unwrap_err();
        assert!(matches!(err, LookupError::MissingAsn(_)));
        assert_eq!(err.kind(), "missing_asn");
    }

    #[test]
    fn test_open_compressed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoLite2-ASN.mmdb.zst");
        let raw = std::fs::read(FIXTURE).unwrap();
        std::fs::write(&path, zstd::encode_all(raw.as_slice(), 3).unwrap()).unwrap();

        let lookup = open_or_absent(&path);
        assert!(lookup.is_available());
        assert_eq!(lookup.lookup(ip("81.2.69.160")).unwrap().asn, 35236);
    }

    #[test]
    fn test_absent_lookup_reports_unavailable() {
        let lookup = AbsentLookup;
        let ip: IpAddr = "188.92.102.22".parse().unwrap();

        assert!(!lookup.is_available());
        assert!(matches!(lookup.lookup(ip), Err(LookupError::DatabaseUnavailable)));
    }

    #[test]
    fn test_open_missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = open_or_absent(&dir.path().join("GeoLite2-ASN.mmdb"));
        assert!(!lookup.is_available());
    }

    #[test]
    fn test_open_garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoLite2-ASN.mmdb");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"definitely not a maxmind database").unwrap();

        let err = open(&path).unwrap_err();
        assert!(matches!(err, LookupError::Open { .. }));
        assert_eq!(err.kind(), "open");

        // The gate swallows the error and degrades.
        assert!(!open_or_absent(&path).is_available());
    }

    #[test]
    fn test_open_bad_zstd_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoLite2-ASN.mmdb.zst");
        std::fs::write(&path, b"not zstd").unwrap();

        assert!(matches!(open(&path), Err(LookupError::Decompress { .. })));
    }
}
