//! Client configuration

use crate::{Error, Result};
use fusion_digest::ChecksumAlgorithm;
use std::time::Duration;

/// Default API root
pub const DEFAULT_ROOT_URL: &str = "https://fusion.jpmorgan.com/api/v1";

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// API root URL
    pub root_url: String,
    /// Worker pool width for multi-part downloads
    pub download_threads: usize,
    /// Worker pool width for multi-part uploads
    pub upload_threads: usize,
    /// Largest source that still takes the single-part upload path
    /// (inclusive); anything larger is a multi-part candidate
    pub single_part_ceiling: u64,
    /// Fixed chunk size for multi-part uploads (bytes)
    pub chunk_size: u64,
    /// Ceiling on upload bytes dispatched but not yet acknowledged
    pub in_flux_ceiling: u64,
    /// Checksum algorithm used for digests and verification
    pub algorithm: ChecksumAlgorithm,
    /// Verify content checksums on transfer; when false, digests are still
    /// computed but never compared
    pub verify_checksums: bool,
    /// Connect timeout for the underlying HTTP client (transfers themselves
    /// are unbounded; the transport owns read timeouts)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            download_threads: 4,
            upload_threads: 4,
            single_part_ceiling: 100 * 1024 * 1024, // 100 MiB
            chunk_size: 8 * 1024 * 1024,            // 8 MiB
            in_flux_ceiling: 32 * 1024 * 1024,      // 4 chunks
            algorithm: ChecksumAlgorithm::default(),
            verify_checksums: true,
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("fusion-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Create a new config against the given API root
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            ..Default::default()
        }
    }

    /// Set both worker pool widths
    pub fn with_threads(mut self, download: usize, upload: usize) -> Self {
        self.download_threads = download;
        self.upload_threads = upload;
        self
    }

    /// Set the single-part ceiling
    pub fn with_single_part_ceiling(mut self, bytes: u64) -> Self {
        self.single_part_ceiling = bytes;
        self
    }

    /// Set the upload chunk size
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the in-flux (unacknowledged upload bytes) ceiling
    pub fn with_in_flux_ceiling(mut self, bytes: u64) -> Self {
        self.in_flux_ceiling = bytes;
        self
    }

    /// Select the checksum algorithm
    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Disable checksum comparison (digests are still computed)
    pub fn with_skip_verification(mut self) -> Self {
        self.verify_checksums = false;
        self
    }

    /// Check invariants; raised at client construction, before any
    /// network call
    pub(crate) fn validate(&self) -> Result<()> {
        if let Err(e) = url::Url::parse(&self.root_url) {
            return Err(Error::Validation(format!("invalid root_url: {e}")));
        }
        if self.download_threads == 0 || self.upload_threads == 0 {
            return Err(Error::Validation(
                "worker pool sizes must be positive".into(),
            ));
        }
        if self.single_part_ceiling == 0 || self.chunk_size == 0 {
            return Err(Error::Validation(
                "single_part_ceiling and chunk_size must be positive".into(),
            ));
        }
        if self.chunk_size > self.in_flux_ceiling {
            return Err(Error::Validation(format!(
                "chunk_size ({}) must not exceed in_flux_ceiling ({})",
                self.chunk_size, self.in_flux_ceiling
            )));
        }
        Ok(())
    }

    /// Absolute URL for a path relative to the API root
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root_url.trim_end_matches('/'), path)
    }
}
