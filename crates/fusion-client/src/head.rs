//! Remote object transfer metadata

use crate::client::RequestContext;
use crate::{wire, Error, Result};
use fusion_digest::ChecksumAlgorithm;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE};

/// Transfer metadata of a remote distribution, derived from the response
/// headers of a metadata probe or of a fetched part.
///
/// Immutable; one instance per probe or per part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteObjectHead {
    /// Total content length in bytes (or this part's length, for per-part
    /// probes)
    pub content_length: u64,
    /// Number of stored parts; 0 or 1 means single-part
    pub part_count: u32,
    /// Byte range `(start, end)` of this part within the object, when the
    /// response describes a single part
    pub content_range: Option<(u64, u64)>,
    /// Checksum advertised by the remote, in transmittable form
    pub checksum: Option<String>,
}

impl RemoteObjectHead {
    /// Whether the distribution is stored as more than one part
    pub fn is_multipart(&self) -> bool {
        self.part_count > 1
    }

    pub(crate) fn from_headers(headers: &HeaderMap, algorithm: ChecksumAlgorithm) -> Result<Self> {
        let content_length = header_u64(headers, CONTENT_LENGTH.as_str())?.unwrap_or(0);
        let part_count = header_u64(headers, wire::HEADER_PARTS_COUNT)?.unwrap_or(0) as u32;

        let content_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(parse_content_range)
            .transpose()?;

        let checksum_header = format!(
            "{}{}",
            wire::HEADER_CHECKSUM_PREFIX,
            algorithm.header_suffix()
        );
        let checksum = headers
            .get(&checksum_header)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            content_length,
            part_count,
            content_range,
            checksum,
        })
    }
}

/// Issue the metadata probe for a distribution (optionally for one part)
/// and parse its transfer metadata.
///
/// Any non-success response is fatal to the whole transfer; there is no
/// retry at this layer.
pub(crate) async fn resolve(ctx: &RequestContext, part: Option<u32>) -> Result<RemoteObjectHead> {
    let url = wire::download_path(&ctx.resource_url);
    let headers = ctx.auth_headers().await?;
    let mut request = ctx.http.get(&url).headers(headers).query(&[("head", "true")]);
    if let Some(number) = part {
        request = request.query(&[(wire::QUERY_DOWNLOAD_PART_NUMBER, number.to_string())]);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(Error::from_response(response).await);
    }
    RemoteObjectHead::from_headers(response.headers(), ctx.algorithm)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Result<Option<u64>> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| Error::InvalidResponse(format!("bad {name} header: {v}")))
        })
        .transpose()
}

/// Parse a `Content-Range` value of the form `bytes <start>-<end>/<total>`
fn parse_content_range(value: &str) -> Result<(u64, u64)> {
    let invalid = || Error::InvalidResponse(format!("bad Content-Range header: {value}"));

    let range = value
        .strip_prefix("bytes ")
        .and_then(|rest| rest.split('/').next())
        .ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    Ok((
        start.parse().map_err(|_| invalid())?,
        end.parse().map_err(|_| invalid())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn multipart_head_parses_all_fields() {
        let head = RemoteObjectHead::from_headers(
            &headers(&[
                ("content-length", "1500"),
                ("x-jpmc-parts-count", "3"),
                ("content-range", "bytes 500-999/1500"),
                ("x-jpmc-checksum-sha256", "abc123="),
            ]),
            ChecksumAlgorithm::Sha256,
        )
        .unwrap();

        assert_eq!(head.content_length, 1500);
        assert_eq!(head.part_count, 3);
        assert!(head.is_multipart());
        assert_eq!(head.content_range, Some((500, 999)));
        assert_eq!(head.checksum.as_deref(), Some("abc123="));
    }

    #[test]
    fn absent_part_count_means_single_part() {
        let head = RemoteObjectHead::from_headers(
            &headers(&[("content-length", "10")]),
            ChecksumAlgorithm::Sha256,
        )
        .unwrap();
        assert_eq!(head.part_count, 0);
        assert!(!head.is_multipart());
        assert_eq!(head.checksum, None);
    }

    #[test]
    fn checksum_header_follows_the_selected_algorithm() {
        let map = headers(&[
            ("x-jpmc-checksum-sha256", "sha-digest"),
            ("x-jpmc-checksum-crc32c", "crc-digest"),
        ]);
        let sha = RemoteObjectHead::from_headers(&map, ChecksumAlgorithm::Sha256).unwrap();
        let crc = RemoteObjectHead::from_headers(&map, ChecksumAlgorithm::Crc32c).unwrap();
        assert_eq!(sha.checksum.as_deref(), Some("sha-digest"));
        assert_eq!(crc.checksum.as_deref(), Some("crc-digest"));
    }

    #[test]
    fn malformed_content_range_is_an_invalid_response() {
        let err = RemoteObjectHead::from_headers(
            &headers(&[("content-range", "pages 1-2/3")]),
            ChecksumAlgorithm::Sha256,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
