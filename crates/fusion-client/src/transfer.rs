//! Transfer orchestration
//!
//! Selects the single- vs multi-part strategy for both directions, wires
//! the head resolver, worker pool, integrity verification and reassembly
//! together, and owns abort-on-failure for multipart uploads. Worker
//! pools live for exactly one transfer call.

use crate::client::RequestContext;
use crate::compose::{self, ByteStream, DownloadStream};
use crate::head::{self, RemoteObjectHead};
use crate::pool::PartPool;
use crate::request::UploadSource;
use crate::session::MultipartSession;
use crate::{wire, Config, DistributionDates, Error, Result};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use fusion_digest::{DigestProducer, Verification, VerifiedStream};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One fetched and verified part
pub(crate) struct FetchedPart {
    pub range_start: u64,
    pub data: Bytes,
}

/// Issues part and whole-object fetches for one download
#[derive(Clone)]
pub(crate) struct PartFetcher {
    ctx: RequestContext,
}

impl PartFetcher {
    async fn send_get(&self, part: Option<u32>) -> Result<reqwest::Response> {
        let url = wire::download_path(&self.ctx.resource_url);
        let headers = self.ctx.auth_headers().await?;
        let mut request = self.ctx.http.get(&url).headers(headers);
        if let Some(number) = part {
            request = request.query(&[(wire::QUERY_DOWNLOAD_PART_NUMBER, number.to_string())]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(response)
    }

    fn verification(&self, head: &RemoteObjectHead) -> Verification {
        if !self.ctx.verify {
            return Verification::Skip;
        }
        match &head.checksum {
            Some(expected) => Verification::expect(expected.clone()),
            // Nothing to compare against; still computed, never enforced.
            None => Verification::Skip,
        }
    }

    /// Fetch one part, verify it, and buffer it with its byte offset
    pub(crate) async fn fetch_part(&self, number: u32) -> Result<FetchedPart> {
        let response = self.send_get(Some(number)).await?;
        let head = RemoteObjectHead::from_headers(response.headers(), self.ctx.algorithm)?;
        let range_start = match head.content_range {
            Some((start, _)) => start,
            None if number <= 1 => 0,
            None => {
                return Err(Error::InvalidResponse(format!(
                    "part {number} response missing Content-Range"
                )));
            }
        };

        let stream = VerifiedStream::new(
            response.bytes_stream().map_err(Error::Http),
            self.ctx.algorithm,
            self.verification(&head),
        );
        let mut stream = std::pin::pin!(stream);
        let mut data = BytesMut::with_capacity(head.content_length as usize);
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.map_err(Error::from)?);
        }

        Ok(FetchedPart {
            range_start,
            data: data.freeze(),
        })
    }

    /// Open the whole object as one verified stream
    pub(crate) async fn open_whole(&self) -> Result<ByteStream> {
        let response = self.send_get(None).await?;
        let head = RemoteObjectHead::from_headers(response.headers(), self.ctx.algorithm)?;
        let verification = self.verification(&head);
        let stream = VerifiedStream::new(
            response.bytes_stream().map_err(Error::Http),
            self.ctx.algorithm,
            verification,
        )
        .map_err(Error::from);
        Ok(Box::pin(stream))
    }
}

/// Per-call orchestrator for one transfer
pub(crate) struct TransferCoordinator<'a> {
    config: &'a Config,
    ctx: RequestContext,
}

impl<'a> TransferCoordinator<'a> {
    pub(crate) fn new(config: &'a Config, ctx: RequestContext) -> Self {
        Self { config, ctx }
    }

    fn fetcher(&self) -> PartFetcher {
        PartFetcher {
            ctx: self.ctx.clone(),
        }
    }

    /// Download to a file, returning the bytes written
    pub(crate) async fn download_to_file(&self, dest: &Path) -> Result<u64> {
        self.run_download_to_file(dest)
            .await
            .map_err(|e| Error::transfer("download", e))
    }

    async fn run_download_to_file(&self, dest: &Path) -> Result<u64> {
        let head = head::resolve(&self.ctx, None).await?;
        if head.is_multipart() {
            debug!(parts = head.part_count, total = head.content_length, "multi-part download");
            let pool = PartPool::new(self.config.download_threads)?;
            compose::compose_to_file(self.fetcher(), &pool, &head, dest).await
        } else {
            debug!(total = head.content_length, "single-part download");
            let mut stream = self.fetcher().open_whole().await?;
            let mut file = tokio::fs::File::create(dest).await?;
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(written)
        }
    }

    /// Download into memory
    pub(crate) async fn download_bytes(&self) -> Result<Bytes> {
        self.run_download_bytes()
            .await
            .map_err(|e| Error::transfer("download", e))
    }

    async fn run_download_bytes(&self) -> Result<Bytes> {
        let head = head::resolve(&self.ctx, None).await?;
        if head.is_multipart() {
            let pool = PartPool::new(self.config.download_threads)?;
            let fetcher = self.fetcher();
            let ops = (1..=head.part_count)
                .map(|number| {
                    let fetcher = fetcher.clone();
                    (number, async move {
                        fetcher.fetch_part(number).await.map(|part| part.data)
                    })
                })
                .collect();
            // Results come back ordered by part number regardless of
            // completion order.
            let parts: Vec<Bytes> = pool.run(ops).await?;
            let mut out = BytesMut::with_capacity(head.content_length as usize);
            for part in parts {
                out.extend_from_slice(&part);
            }
            Ok(out.freeze())
        } else {
            DownloadStream::from_stream(self.fetcher().open_whole().await?)
                .collect()
                .await
        }
    }

    /// Open the object as a lazily-composed stream
    pub(crate) async fn download_stream(&self) -> Result<DownloadStream> {
        let head = head::resolve(&self.ctx, None)
            .await
            .map_err(|e| Error::transfer("download", e))?;
        if head.is_multipart() {
            Ok(DownloadStream::lazy_parts(self.fetcher(), head.part_count))
        } else {
            let stream = self
                .fetcher()
                .open_whole()
                .await
                .map_err(|e| Error::transfer("download", e))?;
            Ok(DownloadStream::from_stream(stream))
        }
    }

    /// Upload a classified source
    pub(crate) async fn upload(
        &self,
        source: UploadSource,
        dates: DistributionDates,
        multipart: bool,
    ) -> Result<()> {
        let outcome = if multipart {
            self.upload_multipart(source, dates).await
        } else {
            self.upload_single(source, dates).await
        };
        outcome.map_err(|e| Error::transfer("upload", e))
    }

    async fn upload_single(&self, source: UploadSource, dates: DistributionDates) -> Result<()> {
        let producer = DigestProducer::new(self.ctx.algorithm);
        let descriptor = source.into_descriptor(&producer).await?;
        debug!(size = descriptor.size(), "single-part upload");

        let headers = self.ctx.auth_headers().await?;
        let mut request = self
            .ctx
            .http
            .put(&self.ctx.resource_url)
            .headers(headers)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            )
            .header(CONTENT_LENGTH, descriptor.size())
            .header(
                wire::HEADER_DIGEST,
                format!("{}={}", self.ctx.algorithm.name(), descriptor.encoded()),
            );
        for (name, value) in dates.headers() {
            request = request.header(name, value);
        }

        let response = request.body(descriptor.into_data()).send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(())
    }

    async fn upload_multipart(&self, source: UploadSource, dates: DistributionDates) -> Result<()> {
        let mut session = MultipartSession::new(self.ctx.clone(), self.config, dates.headers());
        session.start().await?;
        debug!(operation_id = ?session.operation_id(), "multipart session started");

        // Any failure past initiation goes through the abort path.
        let outcome = self.run_multipart_phases(&mut session, source).await;

        if let Err(original) = outcome {
            // Best-effort cleanup; the original failure is what the
            // caller observes.
            if let Err(abort_err) = session.abort().await {
                warn!(error = %abort_err, "abort after failed multipart upload also failed");
            }
            debug!(state = ?session.state(), "multipart session terminated");
            return Err(original);
        }
        Ok(())
    }

    async fn run_multipart_phases(
        &self,
        session: &mut MultipartSession,
        source: UploadSource,
    ) -> Result<()> {
        let reader = source.into_reader().await?;
        let pool = PartPool::new(self.config.upload_threads)?;
        session.upload_parts(reader, &pool).await?;
        session.complete().await
    }
}
