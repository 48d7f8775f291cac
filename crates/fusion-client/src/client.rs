//! Main client implementation

use crate::auth::TokenProvider;
use crate::compose::DownloadStream;
use crate::head::{self, RemoteObjectHead};
use crate::transfer::TransferCoordinator;
use crate::types::*;
use crate::{wire, Config, DownloadRequest, Error, Result, UploadRequest};
use bytes::Bytes;
use fusion_digest::ChecksumAlgorithm;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fusion catalog and data-distribution client
pub struct FusionClient {
    config: Config,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl FusionClient {
    /// Create a new client with the given configuration and token provider
    pub fn new(config: Config, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|_| Error::Validation("invalid user agent".into()))?,
        );

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Create a client against the given API root
    pub fn with_root_url(root_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::new(Config::new(root_url), tokens)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Catalog Metadata ====================

    /// List all catalogs
    #[instrument(skip(self))]
    pub async fn list_catalogs(&self) -> Result<Vec<Catalog>> {
        self.get_resources("catalogs").await
    }

    /// List the datasets of a catalog
    #[instrument(skip(self))]
    pub async fn list_datasets(&self, catalog: &str) -> Result<Vec<Dataset>> {
        self.get_resources(&format!("catalogs/{catalog}/datasets"))
            .await
    }

    /// List the attributes (schema) of a dataset
    #[instrument(skip(self))]
    pub async fn list_dataset_attributes(
        &self,
        catalog: &str,
        dataset: &str,
    ) -> Result<Vec<Attribute>> {
        self.get_resources(&format!("catalogs/{catalog}/datasets/{dataset}/attributes"))
            .await
    }

    /// List the series members of a dataset
    #[instrument(skip(self))]
    pub async fn list_datasetmembers(
        &self,
        catalog: &str,
        dataset: &str,
    ) -> Result<Vec<DatasetMember>> {
        self.get_resources(&format!(
            "catalogs/{catalog}/datasets/{dataset}/datasetseries"
        ))
        .await
    }

    // ==================== Distribution Transfer ====================

    /// Probe a distribution's transfer metadata without downloading it
    #[instrument(skip(self, request))]
    pub async fn head(&self, request: &DownloadRequest) -> Result<RemoteObjectHead> {
        head::resolve(&self.download_context(request), None).await
    }

    /// Probe the transfer metadata of one part of a distribution
    #[instrument(skip(self, request))]
    pub async fn head_part(
        &self,
        request: &DownloadRequest,
        part_number: u32,
    ) -> Result<RemoteObjectHead> {
        head::resolve(&self.download_context(request), Some(part_number)).await
    }

    /// Download a distribution to a file, returning the bytes written.
    ///
    /// The content is always integrity-verified (unless verification is
    /// disabled in the configuration), regardless of whether the remote
    /// stores it as one part or many.
    #[instrument(skip(self, request, dest))]
    pub async fn download_to_file(
        &self,
        request: &DownloadRequest,
        dest: impl AsRef<Path>,
    ) -> Result<u64> {
        self.coordinator(request)
            .download_to_file(dest.as_ref())
            .await
    }

    /// Download a distribution into memory
    #[instrument(skip(self, request))]
    pub async fn download_bytes(&self, request: &DownloadRequest) -> Result<Bytes> {
        self.coordinator(request).download_bytes().await
    }

    /// Open a distribution as a consumable stream.
    ///
    /// Parts are fetched lazily with one fetch in flight ahead of the
    /// consumer; bytes arrive strictly in part order.
    #[instrument(skip(self, request))]
    pub async fn download_stream(&self, request: &DownloadRequest) -> Result<DownloadStream> {
        self.coordinator(request).download_stream().await
    }

    /// Upload a distribution.
    ///
    /// Sources at or under the configured single-part ceiling take the
    /// single-part path; larger sources are driven through a multipart
    /// session that is aborted on any failure.
    #[instrument(skip(self, request))]
    pub async fn upload(&self, request: UploadRequest) -> Result<()> {
        let ctx = self.context(
            request.catalog(),
            request.dataset(),
            request.resource_path(),
            request.headers(),
        );
        let dates = request.dates();
        let multipart = request.is_multipart_candidate();
        TransferCoordinator::new(&self.config, ctx)
            .upload(request.into_source(), dates, multipart)
            .await
    }

    // ==================== Helper Methods ====================

    fn coordinator(&self, request: &DownloadRequest) -> TransferCoordinator<'_> {
        TransferCoordinator::new(&self.config, self.download_context(request))
    }

    fn download_context(&self, request: &DownloadRequest) -> RequestContext {
        self.context(
            request.catalog(),
            request.dataset(),
            request.resource_path(),
            request.headers(),
        )
    }

    fn context(
        &self,
        catalog: &str,
        dataset: &str,
        resource_path: String,
        extra_headers: &[(String, String)],
    ) -> RequestContext {
        RequestContext {
            http: self.http.clone(),
            tokens: Arc::clone(&self.tokens),
            resource_url: self.config.url(&resource_path),
            catalog: catalog.to_string(),
            dataset: dataset.to_string(),
            extra_headers: extra_headers.to_vec(),
            algorithm: self.config.algorithm,
            verify: self.config.verify_checksums,
        }
    }

    async fn get_resources<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.config.url(path);
        let session = self.tokens.session_token().await?;

        debug!("GET {url}");
        let response = self.http.get(&url).bearer_auth(session).send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        let listed: Resources<T> = response.json().await?;
        Ok(listed.resources)
    }
}

/// Everything one distribution call needs to hit the wire: the shared
/// HTTP client, the token provider, and the resolved resource URL.
///
/// Tokens are obtained freshly for every request; nothing is cached here.
#[derive(Clone)]
pub(crate) struct RequestContext {
    pub(crate) http: reqwest::Client,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) resource_url: String,
    pub(crate) catalog: String,
    pub(crate) dataset: String,
    pub(crate) extra_headers: Vec<(String, String)>,
    pub(crate) algorithm: ChecksumAlgorithm,
    pub(crate) verify: bool,
}

impl RequestContext {
    /// Assemble the per-request header set: both bearer tokens plus any
    /// caller-supplied extras
    pub(crate) async fn auth_headers(&self) -> Result<HeaderMap> {
        let session = self.tokens.session_token().await?;
        let dataset = self
            .tokens
            .dataset_token(&self.catalog, &self.dataset)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer(&session)?);
        headers.insert(
            HeaderName::from_bytes(wire::HEADER_FUSION_AUTHORIZATION.as_bytes())
                .map_err(|e| Error::Validation(format!("invalid header name: {e}")))?,
            bearer(&dataset)?,
        );
        for (name, value) in &self.extra_headers {
            let parsed = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Validation(format!("invalid header name {name}: {e}")))?;
            headers.insert(
                parsed,
                HeaderValue::from_str(value)
                    .map_err(|e| Error::Validation(format!("invalid value for header {name}: {e}")))?,
            );
        }
        Ok(headers)
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::Validation(format!("invalid bearer token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn client() -> FusionClient {
        FusionClient::new(
            Config::new("http://localhost:9000"),
            Arc::new(StaticTokenProvider::new("session-token", "dataset-token")),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let result = FusionClient::new(
            Config::default().with_threads(0, 0),
            Arc::new(StaticTokenProvider::new("s", "d")),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn auth_headers_carry_both_tokens() {
        let client = client();
        let request = DownloadRequest::new("common", "FXO_SP", "20260807", "csv").unwrap();
        let headers = client
            .download_context(&request)
            .auth_headers()
            .await
            .unwrap();

        assert_eq!(
            headers.get("authorization").unwrap(),
            "Bearer session-token"
        );
        assert_eq!(
            headers.get("fusion-authorization").unwrap(),
            "Bearer dataset-token"
        );
    }

    #[tokio::test]
    async fn extra_request_headers_are_attached() {
        let client = client();
        let request = DownloadRequest::new("c", "d", "m", "csv")
            .unwrap()
            .with_header("x-request-id", "42");
        let headers = client
            .download_context(&request)
            .auth_headers()
            .await
            .unwrap();
        assert_eq!(headers.get("x-request-id").unwrap(), "42");
    }

    #[test]
    fn resource_url_is_rooted_at_the_api() {
        let client = client();
        let request = DownloadRequest::new("c", "d", "m", "csv").unwrap();
        assert_eq!(
            client.download_context(&request).resource_url,
            "http://localhost:9000/catalogs/c/datasets/d/datasetseries/m/distributions/csv",
        );
    }
}
