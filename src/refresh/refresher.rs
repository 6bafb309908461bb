//! ASN database download and installation.
//!
//! # Responsibilities
//! - Download the database archive with the configured license key
//! - Unpack the `.mmdb` file from the tar.gz archive
//! - Verify it opens, then atomically replace the file in use
//! - Ask the server to reopen the database afterwards

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use url::Url;

use crate::config::RefreshConfig;
use crate::lifecycle::ReloadSignal;
use crate::observability::metrics;

/// Errors that can occur while refreshing the database.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh.license_key is not configured")]
    MissingLicenseKey,

    #[error("invalid download url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport failure. The URL is stripped so the license key never shows up.
    #[error("download failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("download returned HTTP {0}")]
    Status(u16),

    #[error("failed to unpack archive: {0}")]
    Archive(#[source] std::io::Error),

    #[error("archive contains no .mmdb file for {0}")]
    MissingDatabase(String),

    #[error("archived database is {0} bytes, over the limit of {limit} bytes", limit = MAX_DATABASE_SIZE)]
    DatabaseTooLarge(u64),

    #[error("downloaded database is invalid: {0}")]
    InvalidDatabase(String),

    #[error("failed to install database: {0}")]
    Io(#[from] std::io::Error),
}

/// Periodically replaces the ASN database file.
pub struct DatabaseRefresher {
    config: RefreshConfig,
    database_path: PathBuf,
    client: reqwest::Client,
    reload_tx: Option<mpsc::UnboundedSender<ReloadSignal>>,
}

impl DatabaseRefresher {
    pub fn new(config: RefreshConfig, database_path: impl Into<PathBuf>) -> Result<Self, RefreshError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RefreshError::Http)?;

        Ok(Self {
            config,
            database_path: database_path.into(),
            client,
            reload_tx: None,
        })
    }

    /// Send [`ReloadSignal::Database`] on `tx` after every successful refresh.
    pub fn with_reload_channel(mut self, tx: mpsc::UnboundedSender<ReloadSignal>) -> Self {
        self.reload_tx = Some(tx);
        self
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Full download URL, license key included. Do not log it.
    pub fn download_url(&self) -> Result<Url, RefreshError> {
        let key = self
            .config
            .license_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(RefreshError::MissingLicenseKey)?;

        let mut url = Url::parse(&self.config.download_url)?;
        url.query_pairs_mut()
            .append_pair("edition_id", &self.config.edition_id)
            .append_pair("license_key", key)
            .append_pair("suffix", "tar.gz");
        Ok(url)
    }

    /// Download, verify and install the database once.
    pub async fn refresh_once(&self) -> Result<(), RefreshError> {
        let url = self.download_url()?;

        tracing::info!(edition = %self.config.edition_id, "Downloading ASN database");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RefreshError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        let archive = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Http(e.without_url()))?;

        let edition = self.config.edition_id.clone();
        let target = self.database_path.clone();
        tokio::task::spawn_blocking(move || {
            let database = extract_database(&archive, &edition)?;
            install_database(&database, &target)
        })
        .await
        .map_err(|e| RefreshError::Io(std::io::Error::other(e)))??;

        tracing::info!(path = %self.database_path.display(), "ASN database installed");
        Ok(())
    }

    /// Refresh on a fixed interval until `shutdown` fires.
    ///
    /// Runs immediately when no database exists yet, otherwise waits one
    /// interval first.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let period = Duration::from_secs(self.config.interval_secs);
        let start = if self.database_path.exists() {
            Instant::now() + period
        } else {
            Instant::now()
        };
        let mut ticker = time::interval_at(start, period);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            path = %self.database_path.display(),
            "Database refresher starting"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Database refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.refresh_once().await {
            Ok(()) => {
                metrics::record_refresh("success");
                if let Some(tx) = &self.reload_tx {
                    let _ = tx.send(ReloadSignal::Database);
                }
            }
            Err(e) => {
                metrics::record_refresh("failure");
                tracing::error!(error = %e, "ASN database refresh failed. Keeping current database.");
            }
        }
    }
}

/// Largest database accepted from an archive. GeoLite2-ASN is well under 20 MiB.
pub const MAX_DATABASE_SIZE: u64 = 256 * 1024 * 1024;

/// Pull the `.mmdb` file out of a tar.gz archive.
pub fn extract_database(archive: &[u8], edition: &str) -> Result<Vec<u8>, RefreshError> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));

    for entry in tar.entries().map_err(RefreshError::Archive)? {
        let entry = entry.map_err(RefreshError::Archive)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let is_database = entry
            .path()
            .map_err(RefreshError::Archive)?
            .extension()
            .is_some_and(|ext| ext == "mmdb");
        if !is_database {
            continue;
        }

        // The header size is untrusted; it only gates the read.
        let declared = entry.size();
        if declared > MAX_DATABASE_SIZE {
            return Err(RefreshError::DatabaseTooLarge(declared));
        }

        let mut content = Vec::new();
        entry
            .take(MAX_DATABASE_SIZE + 1)
            .read_to_end(&mut content)
            .map_err(RefreshError::Archive)?;
        if content.len() as u64 > MAX_DATABASE_SIZE {
            return Err(RefreshError::DatabaseTooLarge(content.len() as u64));
        }
        return Ok(content);
    }

    Err(RefreshError::MissingDatabase(edition.to_string()))
}

/// Verify `content` is a readable MMDB and atomically move it to `target`.
///
/// The temp file lives next to `target` so the rename stays on one filesystem.
pub fn install_database(content: &[u8], target: &Path) -> Result<(), RefreshError> {
    maxminddb::Reader::from_source(content).map_err(|e| RefreshError::InvalidDatabase(e.to_string()))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asn-database".to_string());
    let temp = target.with_file_name(format!(".{file_name}.download"));

    if target.extension().is_some_and(|ext| ext == "zst") {
        fs::write(&temp, zstd::encode_all(content, 0)?)?;
    } else {
        fs::write(&temp, content)?;
    }
    if let Err(e) = fs::rename(&temp, target) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn::AsnLookup;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn fixture() -> Vec<u8> {
        fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/asn-test.mmdb")).unwrap()
    }

    fn refresher(key: Option<&str>) -> DatabaseRefresher {
        let config = RefreshConfig {
            license_key: key.map(str::to_string),
            ..RefreshConfig::default()
        };
        DatabaseRefresher::new(config, "GeoLite2-ASN.mmdb").unwrap()
    }

    #[test]
    fn test_download_url() {
        let url = refresher(Some("secret")).download_url().unwrap();
        assert_eq!(url.host_str(), Some("download.maxmind.com"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("edition_id".into(), "GeoLite2-ASN".into())));
        assert!(pairs.contains(&("license_key".into(), "secret".into())));
        assert!(pairs.contains(&("suffix".into(), "tar.gz".into())));
    }

    #[test]
    fn test_download_url_needs_key() {
        assert!(matches!(refresher(None).download_url(), Err(RefreshError::MissingLicenseKey)));
        assert!(matches!(refresher(Some("  ")).download_url(), Err(RefreshError::MissingLicenseKey)));
    }

    #[test]
    fn test_extract_database() {
        let data = archive(&[
            ("GeoLite2-ASN_20240101/COPYRIGHT.txt", b"copyright"),
            ("GeoLite2-ASN_20240101/GeoLite2-ASN.mmdb", b"mmdb bytes"),
        ]);
        assert_eq!(extract_database(&data, "GeoLite2-ASN").unwrap(), b"mmdb bytes");
    }

    #[test]
    fn test_extract_without_database() {
        let data = archive(&[("GeoLite2-ASN_20240101/LICENSE.txt", b"license")]);
        assert!(matches!(
            extract_database(&data, "GeoLite2-ASN"),
            Err(RefreshError::MissingDatabase(_))
        ));
    }

    #[test]
    fn test_extract_not_gzip() {
        assert!(matches!(
            extract_database(b"plain text", "GeoLite2-ASN"),
            Err(RefreshError::Archive(_))
        ));
    }

    #[test]
    fn test_invalid_database_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("GeoLite2-ASN.mmdb");
        fs::write(&target, b"previous").unwrap();

        let err = install_database(b"garbage", &target).unwrap_err();
        assert!(matches!(err, RefreshError::InvalidDatabase(_)));
        assert_eq!(fs::read(&target).unwrap(), b"previous");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_oversized_entry_rejected_without_allocating() {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_path("GeoLite2-ASN_20240101/GeoLite2-ASN.mmdb").unwrap();
        header.set_size(1 << 40);
        header.set_mode(0o644);
        header.set_cksum();

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder.append(&header, std::io::empty()).unwrap();
        let data = builder.into_inner().unwrap().finish().unwrap();

        assert!(matches!(
            extract_database(&data, "GeoLite2-ASN"),
            Err(RefreshError::DatabaseTooLarge(size)) if size == 1 << 40
        ));
    }

    #[test]
    fn test_extract_and_install_real_database() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("GeoLite2-ASN.mmdb");
        let data = archive(&[
            ("GeoLite2-ASN_20240101/LICENSE.txt", b"license"),
            ("GeoLite2-ASN_20240101/GeoLite2-ASN.mmdb", &fixture()),
        ]);

        let database = extract_database(&data, "GeoLite2-ASN").unwrap();
        assert_eq!(database, fixture());
        install_database(&database, &target).unwrap();

        let lookup = crate::asn::open(&target).unwrap();
        assert_eq!(lookup.database_type(), "GeoLite2-ASN");
        assert_eq!(lookup.lookup("188.92.102.22".parse().unwrap()).unwrap().asn, 206948);
        // Only the database itself; the temp file was renamed away.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_install_replaces_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("GeoLite2-ASN.mmdb");
        fs::write(&target, b"previous").unwrap();

        install_database(&fixture(), &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), fixture());
    }

    #[test]
    fn test_install_compressed_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("GeoLite2-ASN.mmdb.zst");

        install_database(&fixture(), &target).unwrap();
        let stored = fs::read(&target).unwrap();
        assert_eq!(zstd::decode_all(stored.as_slice()).unwrap(), fixture());

        let lookup = crate::asn::open(&target).unwrap();
        let record = lookup.lookup("81.2.69.160".parse().unwrap()).unwrap();
        assert_eq!(record.asn, 35236);
    }
}
