//! Immutable transfer requests
//!
//! Requests are built once by validating factory functions and never
//! mutated. Upload classification (single- vs multi-part) is derived at
//! construction time, before any network call, and does not change
//! mid-transfer.

use crate::{wire, Config, Error, Result};
use bytes::Bytes;
use chrono::NaiveDate;
use fusion_digest::{DigestDescriptor, DigestProducer};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};

/// The distribution date triple attached to uploads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DistributionDates {
    /// First business date the distribution covers
    pub from: NaiveDate,
    /// Last business date the distribution covers
    pub to: NaiveDate,
    /// Date the distribution was created
    pub created: NaiveDate,
}

impl DistributionDates {
    /// Use one date for all three fields
    pub fn single(date: NaiveDate) -> Self {
        Self {
            from: date,
            to: date,
            created: date,
        }
    }

    pub(crate) fn headers(&self) -> [(&'static str, String); 3] {
        [
            (
                wire::HEADER_DISTRIBUTION_FROM_DATE,
                self.from.format("%Y-%m-%d").to_string(),
            ),
            (
                wire::HEADER_DISTRIBUTION_TO_DATE,
                self.to.format("%Y-%m-%d").to_string(),
            ),
            (
                wire::HEADER_DISTRIBUTION_CREATED_DATE,
                self.created.format("%Y-%m-%d").to_string(),
            ),
        ]
    }
}

fn validate_coordinates(
    catalog: &str,
    dataset: &str,
    series_member: &str,
    distribution: &str,
) -> Result<()> {
    for (name, value) in [
        ("catalog", catalog),
        ("dataset", dataset),
        ("series member", series_member),
        ("distribution", distribution),
    ] {
        if value.is_empty() {
            return Err(Error::Validation(format!("{name} must not be empty")));
        }
    }
    Ok(())
}

/// An immutable download descriptor
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    catalog: String,
    dataset: String,
    series_member: String,
    distribution: String,
    headers: Vec<(String, String)>,
}

impl DownloadRequest {
    /// Describe the distribution to download
    pub fn new(
        catalog: impl Into<String>,
        dataset: impl Into<String>,
        series_member: impl Into<String>,
        distribution: impl Into<String>,
    ) -> Result<Self> {
        let (catalog, dataset, series_member, distribution) = (
            catalog.into(),
            dataset.into(),
            series_member.into(),
            distribution.into(),
        );
        validate_coordinates(&catalog, &dataset, &series_member, &distribution)?;
        Ok(Self {
            catalog,
            dataset,
            series_member,
            distribution,
            headers: Vec::new(),
        })
    }

    /// Attach an extra request header, sent verbatim on every call
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Catalog identifier
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Dataset identifier
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn resource_path(&self) -> String {
        wire::distribution_path(
            &self.catalog,
            &self.dataset,
            &self.series_member,
            &self.distribution,
        )
    }
}

/// Where upload content comes from
pub(crate) enum UploadSource {
    /// Fully in memory
    Buffered(Bytes),
    /// A file on disk, sized at request construction
    File { path: PathBuf },
    /// A probed stream: the prefix read during classification plus the
    /// unread remainder (`None` when probing exhausted the stream)
    Reader {
        prefix: Bytes,
        rest: Option<Box<dyn AsyncRead + Send + Unpin>>,
    },
}

impl UploadSource {
    /// A reader over the full content, in order
    pub(crate) async fn into_reader(self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            Self::Buffered(data) => Ok(Box::new(std::io::Cursor::new(data))),
            Self::File { path } => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(Box::new(file))
            }
            Self::Reader { prefix, rest } => match rest {
                Some(rest) => Ok(Box::new(std::io::Cursor::new(prefix).chain(rest))),
                None => Ok(Box::new(std::io::Cursor::new(prefix))),
            },
        }
    }

    /// Buffer the full content and digest it
    pub(crate) async fn into_descriptor(
        self,
        producer: &DigestProducer,
    ) -> Result<DigestDescriptor> {
        match self {
            Self::Buffered(data) => Ok(producer.digest_bytes(data)),
            Self::Reader { prefix, rest: None } => Ok(producer.digest_bytes(prefix)),
            other => {
                let reader = other.into_reader().await?;
                Ok(producer.digest_reader(reader).await?)
            }
        }
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(data) => f.debug_tuple("Buffered").field(&data.len()).finish(),
            Self::File { path } => f.debug_struct("File").field("path", path).finish(),
            Self::Reader { prefix, rest } => f
                .debug_struct("Reader")
                .field("probed", &prefix.len())
                .field("exhausted", &rest.is_none())
                .finish(),
        }
    }
}

/// An immutable upload descriptor
#[derive(Debug)]
pub struct UploadRequest {
    catalog: String,
    dataset: String,
    series_member: String,
    distribution: String,
    dates: DistributionDates,
    headers: Vec<(String, String)>,
    source: UploadSource,
    size: Option<u64>,
    multipart: bool,
}

impl UploadRequest {
    /// Upload from a file on disk.
    ///
    /// A missing or unreadable file is a local validation error; nothing
    /// reaches the network.
    pub async fn from_file(
        catalog: impl Into<String>,
        dataset: impl Into<String>,
        series_member: impl Into<String>,
        distribution: impl Into<String>,
        path: impl AsRef<Path>,
        dates: DistributionDates,
        config: &Config,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::Validation(format!("cannot read {}: {e}", path.display())))?;
        if !metadata.is_file() {
            return Err(Error::Validation(format!(
                "{} is not a file",
                path.display()
            )));
        }
        let len = metadata.len();

        Self::build(
            catalog,
            dataset,
            series_member,
            distribution,
            dates,
            UploadSource::File { path },
            Some(len),
            len > config.single_part_ceiling,
        )
    }

    /// Upload content already in memory
    pub fn from_bytes(
        catalog: impl Into<String>,
        dataset: impl Into<String>,
        series_member: impl Into<String>,
        distribution: impl Into<String>,
        data: impl Into<Bytes>,
        dates: DistributionDates,
        config: &Config,
    ) -> Result<Self> {
        let data = data.into();
        let len = data.len() as u64;

        Self::build(
            catalog,
            dataset,
            series_member,
            distribution,
            dates,
            UploadSource::Buffered(data),
            Some(len),
            len > config.single_part_ceiling,
        )
    }

    /// Upload from a stream of unknown length.
    ///
    /// The stream is probed up to one byte past the single-part ceiling to
    /// classify the transfer; the probed prefix is retained and replayed,
    /// so no bytes are lost.
    pub async fn from_reader<R>(
        catalog: impl Into<String>,
        dataset: impl Into<String>,
        series_member: impl Into<String>,
        distribution: impl Into<String>,
        mut reader: R,
        dates: DistributionDates,
        config: &Config,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let limit = (config.single_part_ceiling as usize).saturating_add(1);
        let mut prefix: Vec<u8> = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        let mut exhausted = false;

        while prefix.len() < limit {
            let want = buf.len().min(limit - prefix.len());
            let n = reader
                .read(&mut buf[..want])
                .await
                .map_err(|e| Error::Validation(format!("unreadable upload stream: {e}")))?;
            if n == 0 {
                exhausted = true;
                break;
            }
            prefix.extend_from_slice(&buf[..n]);
        }

        let multipart = prefix.len() as u64 > config.single_part_ceiling;
        let size = exhausted.then(|| prefix.len() as u64);
        let rest: Option<Box<dyn AsyncRead + Send + Unpin>> =
            (!exhausted).then(|| Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>);

        Self::build(
            catalog,
            dataset,
            series_member,
            distribution,
            dates,
            UploadSource::Reader {
                prefix: Bytes::from(prefix),
                rest,
            },
            size,
            multipart,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        catalog: impl Into<String>,
        dataset: impl Into<String>,
        series_member: impl Into<String>,
        distribution: impl Into<String>,
        dates: DistributionDates,
        source: UploadSource,
        size: Option<u64>,
        multipart: bool,
    ) -> Result<Self> {
        let (catalog, dataset, series_member, distribution) = (
            catalog.into(),
            dataset.into(),
            series_member.into(),
            distribution.into(),
        );
        validate_coordinates(&catalog, &dataset, &series_member, &distribution)?;
        Ok(Self {
            catalog,
            dataset,
            series_member,
            distribution,
            dates,
            headers: Vec::new(),
            source,
            size,
            multipart,
        })
    }

    /// Attach an extra request header, sent verbatim on every call
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the source exceeds the single-part ceiling
    pub fn is_multipart_candidate(&self) -> bool {
        self.multipart
    }

    /// Source size in bytes, when known at construction
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Catalog identifier
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Dataset identifier
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// The distribution date triple
    pub fn dates(&self) -> DistributionDates {
        self.dates
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn resource_path(&self) -> String {
        wire::distribution_path(
            &self.catalog,
            &self.dataset,
            &self.series_member,
            &self.distribution,
        )
    }

    pub(crate) fn into_source(self) -> UploadSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates() -> DistributionDates {
        DistributionDates::single(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap())
    }

    fn config_with_ceiling(bytes: u64) -> Config {
        Config::default()
            .with_single_part_ceiling(bytes)
            .with_chunk_size(bytes.min(8))
    }

    #[test]
    fn empty_coordinates_are_rejected() {
        let err = DownloadRequest::new("", "d", "m", "csv").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn size_at_ceiling_is_single_part() {
        let config = config_with_ceiling(6);
        let request =
            UploadRequest::from_bytes("c", "d", "m", "csv", "foobar", dates(), &config).unwrap();
        assert!(!request.is_multipart_candidate());
        assert_eq!(request.size(), Some(6));
    }

    #[test]
    fn one_byte_past_ceiling_is_multipart() {
        let config = config_with_ceiling(5);
        let request =
            UploadRequest::from_bytes("c", "d", "m", "csv", "foobar", dates(), &config).unwrap();
        assert!(request.is_multipart_candidate());
    }

    #[tokio::test]
    async fn missing_file_is_a_validation_error() {
        let config = Config::default();
        let err = UploadRequest::from_file(
            "c",
            "d",
            "m",
            "csv",
            "/does/not/exist.csv",
            dates(),
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn probed_stream_classifies_and_replays() {
        let config = config_with_ceiling(4);
        let request = UploadRequest::from_reader(
            "c",
            "d",
            "m",
            "csv",
            std::io::Cursor::new(b"foobar".to_vec()),
            dates(),
            &config,
        )
        .await
        .unwrap();
        assert!(request.is_multipart_candidate());

        // The probed prefix is replayed ahead of the remainder.
        let mut reader = request.into_source().into_reader().await.unwrap();
        let mut replayed = Vec::new();
        reader.read_to_end(&mut replayed).await.unwrap();
        assert_eq!(replayed, b"foobar");
    }

    #[tokio::test]
    async fn short_stream_is_single_part_with_known_size() {
        let config = config_with_ceiling(16);
        let request = UploadRequest::from_reader(
            "c",
            "d",
            "m",
            "csv",
            std::io::Cursor::new(b"foobar".to_vec()),
            dates(),
            &config,
        )
        .await
        .unwrap();
        assert!(!request.is_multipart_candidate());
        assert_eq!(request.size(), Some(6));
    }

    #[test]
    fn date_headers_render_iso_dates() {
        let headers = dates().headers();
        assert_eq!(headers[0].0, "x-jpmc-distribution-from-date");
        assert_eq!(headers[0].1, "2026-08-07");
    }
}
