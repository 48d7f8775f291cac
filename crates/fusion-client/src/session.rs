//! Multipart upload session state machine
//!
//! `Created → Initiated → Transferring → Completed`, with `Aborted`
//! reachable from Initiated and Transferring but never from Completed.
//! The part-upload phase runs under a backpressure governor: in-flux is
//! the sum of bytes dispatched but not yet acknowledged, and the read
//! loop blocks reaping acknowledgements whenever dispatching the next
//! chunk would push it past the configured ceiling.

use crate::client::RequestContext;
use crate::pool::{PartDispatcher, PartPool};
use crate::{wire, Config, Error, Result};
use fusion_digest::{DigestDescriptor, DigestProducer};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Session lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    Created,
    Initiated,
    Transferring,
    Completed,
    Aborted,
}

#[derive(Clone, Debug)]
struct PartAck {
    part_number: u32,
    checksum: String,
}

#[derive(Deserialize)]
struct InitiateResponse {
    #[serde(rename = "operationId")]
    operation_id: String,
}

#[derive(Serialize)]
struct ManifestPart {
    #[serde(rename = "partNumber")]
    part_number: u32,
    digest: String,
}

#[derive(Serialize)]
struct CompletionManifest {
    parts: Vec<ManifestPart>,
}

/// The server-tracked lifecycle of one chunked upload
pub(crate) struct MultipartSession {
    ctx: RequestContext,
    chunk_size: u64,
    in_flux_ceiling: u64,
    date_headers: [(&'static str, String); 3],
    operation_id: Option<String>,
    state: SessionState,
    parts: Arc<Mutex<Vec<PartAck>>>,
    total_bytes: u64,
    part_count: u32,
}

impl MultipartSession {
    pub(crate) fn new(
        ctx: RequestContext,
        config: &Config,
        date_headers: [(&'static str, String); 3],
    ) -> Self {
        Self {
            ctx,
            chunk_size: config.chunk_size,
            in_flux_ceiling: config.in_flux_ceiling,
            date_headers,
            operation_id: None,
            state: SessionState::Created,
            parts: Arc::new(Mutex::new(Vec::new())),
            total_bytes: 0,
            part_count: 0,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Call the initiate endpoint and record the assigned operation id
    pub(crate) async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(Error::Validation(format!(
                "cannot start a session in state {:?}",
                self.state
            )));
        }

        let url = wire::upload_initiate_path(&self.ctx.resource_url);
        let headers = self.ctx.auth_headers().await?;
        let mut request = self.ctx.http.post(&url).headers(headers);
        for (name, value) in &self.date_headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let initiated: InitiateResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("missing operation id: {e}")))?;

        debug!(operation_id = %initiated.operation_id, "multipart upload initiated");
        self.operation_id = Some(initiated.operation_id);
        self.state = SessionState::Initiated;
        Ok(())
    }

    /// Read the source in fixed-size chunks and upload each as one part,
    /// bounded by the pool width and the in-flux ceiling.
    pub(crate) async fn upload_parts<R>(&mut self, mut reader: R, pool: &PartPool) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        if self.state != SessionState::Initiated {
            return Err(Error::Validation(format!(
                "cannot upload parts in state {:?}",
                self.state
            )));
        }
        let Some(operation_id) = self.operation_id.clone() else {
            return Err(Error::Validation("session has no operation id".into()));
        };

        let producer = DigestProducer::new(self.ctx.algorithm);
        let mut dispatcher = pool.dispatcher::<u64>();
        let mut in_flux: u64 = 0;
        let mut total_bytes: u64 = 0;
        let mut part_number: u32 = 0;

        loop {
            let chunk = read_chunk(&mut reader, self.chunk_size as usize).await?;
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len() as u64;

            // Backpressure: block until the chunk fits under the ceiling.
            while in_flux + len > self.in_flux_ceiling {
                match dispatcher.reap().await {
                    Some(Ok((_, acked))) => in_flux -= acked,
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }

            part_number += 1;
            total_bytes += len;
            let descriptor = producer.digest_bytes(chunk);
            debug!(part_number, len, in_flux, "dispatching part upload");
            self.spawn_part_put(&mut dispatcher, &operation_id, part_number, descriptor);
            in_flux += len;
        }

        while let Some(reaped) = dispatcher.reap().await {
            reaped?;
        }

        self.transferred(total_bytes, part_number)
    }

    /// Record the geometry of the transferred phase
    pub(crate) fn transferred(&mut self, total_bytes: u64, part_count: u32) -> Result<()> {
        if self.state != SessionState::Initiated {
            return Err(Error::Validation(format!(
                "cannot mark a session transferred in state {:?}",
                self.state
            )));
        }
        self.total_bytes = total_bytes;
        self.part_count = part_count;
        self.state = SessionState::Transferring;
        Ok(())
    }

    /// Finalize the upload with the ordered part-checksum manifest
    pub(crate) async fn complete(&mut self) -> Result<()> {
        if self.state != SessionState::Transferring {
            return Err(Error::Validation(format!(
                "cannot complete a session in state {:?}",
                self.state
            )));
        }
        let Some(operation_id) = self.operation_id.clone() else {
            return Err(Error::Validation("session has no operation id".into()));
        };

        let mut acks = self
            .parts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        acks.sort_by_key(|ack| ack.part_number);

        // The manifest must cover every transmitted part: no gaps, no
        // duplicate part numbers.
        let contiguous = acks.len() as u32 == self.part_count
            && acks
                .iter()
                .enumerate()
                .all(|(i, ack)| ack.part_number == i as u32 + 1);
        if !contiguous {
            return Err(Error::Validation(
                "acknowledged parts do not form a contiguous sequence".into(),
            ));
        }

        let manifest = CompletionManifest {
            parts: acks
                .into_iter()
                .map(|ack| ManifestPart {
                    part_number: ack.part_number,
                    digest: ack.checksum,
                })
                .collect(),
        };
        let body = serde_json::to_vec(&manifest)?;
        let descriptor = DigestProducer::new(self.ctx.algorithm).digest_bytes(body);

        let url = wire::upload_operations_path(&self.ctx.resource_url);
        let headers = self.ctx.auth_headers().await?;
        let response = self
            .ctx
            .http
            .post(&url)
            .headers(headers)
            .query(&[(wire::QUERY_OPERATION_ID, operation_id.as_str())])
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(
                wire::HEADER_DIGEST,
                format!("{}={}", self.ctx.algorithm.name(), descriptor.encoded()),
            )
            .body(descriptor.into_data())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        debug!(operation_id = %operation_id, parts = self.part_count, total_bytes = self.total_bytes, "multipart upload completed");
        self.state = SessionState::Completed;
        Ok(())
    }

    /// Abort the operation. Best-effort cleanup after a failure; never
    /// legal once the session has completed.
    pub(crate) async fn abort(&mut self) -> Result<()> {
        match self.state {
            SessionState::Initiated | SessionState::Transferring => {}
            other => {
                return Err(Error::Validation(format!(
                    "cannot abort a session in state {other:?}"
                )));
            }
        }
        let Some(operation_id) = self.operation_id.clone() else {
            return Err(Error::Validation("session has no operation id".into()));
        };

        // Terminal regardless of how the abort call itself fares.
        self.state = SessionState::Aborted;

        let url = wire::upload_operations_path(&self.ctx.resource_url);
        let headers = self.ctx.auth_headers().await?;
        let response = self
            .ctx
            .http
            .delete(&url)
            .headers(headers)
            .query(&[(wire::QUERY_OPERATION_ID, operation_id.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        debug!(operation_id = %operation_id, "multipart upload aborted");
        Ok(())
    }

    fn spawn_part_put(
        &self,
        dispatcher: &mut PartDispatcher<u64>,
        operation_id: &str,
        part_number: u32,
        descriptor: DigestDescriptor,
    ) {
        let ctx = self.ctx.clone();
        let parts = Arc::clone(&self.parts);
        let operation_id = operation_id.to_string();
        let url = wire::upload_operations_path(&ctx.resource_url);

        dispatcher.spawn(part_number, async move {
            let headers = ctx.auth_headers().await?;
            let len = descriptor.size();
            let checksum = descriptor.encoded().to_string();
            let response = ctx
                .http
                .put(&url)
                .headers(headers)
                .query(&[
                    (wire::QUERY_OPERATION_ID, operation_id),
                    (wire::QUERY_PART_NUMBER, part_number.to_string()),
                ])
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                )
                .header(
                    wire::HEADER_DIGEST,
                    format!("{}={}", ctx.algorithm.name(), checksum),
                )
                .body(descriptor.into_data())
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Error::from_response(response).await);
            }

            parts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(PartAck {
                    part_number,
                    checksum,
                });
            Ok(len)
        });
    }
}

/// Read up to `size` bytes, short only at end of stream
async fn read_chunk<R>(reader: &mut R, size: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use chrono::NaiveDate;

    fn session() -> MultipartSession {
        let ctx = RequestContext {
            http: reqwest::Client::new(),
            tokens: Arc::new(StaticTokenProvider::new("s", "d")),
            resource_url: "http://localhost:0/unreachable".into(),
            catalog: "c".into(),
            dataset: "d".into(),
            extra_headers: Vec::new(),
            algorithm: fusion_digest::ChecksumAlgorithm::Sha256,
            verify: true,
        };
        let dates = crate::DistributionDates::single(
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        );
        MultipartSession::new(ctx, &Config::default(), dates.headers())
    }

    #[tokio::test]
    async fn completing_before_transferring_is_rejected() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Created);
        let err = session.complete().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn aborting_an_unstarted_session_is_rejected() {
        let mut session = session();
        let err = session.abort().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn transferring_requires_initiation() {
        let mut session = session();
        let err = session.transferred(10, 2).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn read_chunk_is_short_only_at_end() {
        let mut reader = std::io::Cursor::new(b"abcdefgh".to_vec());
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"abc");
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"def");
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"gh");
        assert!(read_chunk(&mut reader, 3).await.unwrap().is_empty());
    }
}
