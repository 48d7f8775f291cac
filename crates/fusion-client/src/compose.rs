//! Reassembly of remote parts into one logical byte stream
//!
//! Two strategies, chosen by destination: file sinks fetch parts
//! concurrently and write each at its byte offset under a single mutex;
//! stream sinks pull parts lazily with a look-ahead of exactly one
//! in-flight fetch, exposing bytes strictly in ascending part order.

use crate::head::RemoteObjectHead;
use crate::pool::PartPool;
use crate::transfer::{FetchedPart, PartFetcher};
use crate::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Fetch all parts concurrently and write each at its content-range
/// offset. The destination is pre-sized to the total content length
/// before any write; writes are serialized under one mutex while fetches
/// proceed in parallel, so completion order never corrupts the file.
pub(crate) async fn compose_to_file(
    fetcher: PartFetcher,
    pool: &PartPool,
    head: &RemoteObjectHead,
    dest: &Path,
) -> Result<u64> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
        .await?;
    file.set_len(head.content_length).await?;
    let file = Arc::new(Mutex::new(file));

    let ops = (1..=head.part_count)
        .map(|number| {
            let fetcher = fetcher.clone();
            let file = Arc::clone(&file);
            (number, async move {
                let part = fetcher.fetch_part(number).await?;
                let mut guard = file.lock().await;
                guard.seek(SeekFrom::Start(part.range_start)).await?;
                guard.write_all(&part.data).await?;
                debug!(number, offset = part.range_start, len = part.data.len(), "part written");
                Ok(part.data.len() as u64)
            })
        })
        .collect();

    let written = pool.run(ops).await?;
    file.lock().await.flush().await?;
    Ok(written.into_iter().sum())
}

/// A consumable download: bytes arrive strictly in ascending part order,
/// and the stream ends with a clean end-of-data once no parts remain.
pub struct DownloadStream {
    inner: ByteStream,
}

impl DownloadStream {
    pub(crate) fn from_stream(stream: ByteStream) -> Self {
        Self { inner: stream }
    }

    /// Lazily fetch `1..=part_count`, keeping exactly one fetch in flight
    /// ahead of the consumer. Part N+2 is not dispatched until part N+1
    /// has been yielded. A `part_count` of zero yields end-of-data
    /// immediately.
    pub(crate) fn lazy_parts(fetcher: PartFetcher, part_count: u32) -> Self {
        let first = (part_count >= 1).then(|| Prefetch::spawn(fetcher.clone(), 1));
        let stream = futures::stream::unfold(
            (fetcher, first, 2u32),
            move |(fetcher, inflight, next)| async move {
                let inflight = inflight?;
                let (item, upcoming) = match inflight.join().await {
                    Ok(part) => {
                        let upcoming =
                            (next <= part_count).then(|| Prefetch::spawn(fetcher.clone(), next));
                        (Ok(part.data), upcoming)
                    }
                    Err(e) => (Err(e), None),
                };
                Some((item, (fetcher, upcoming, next + 1)))
            },
        );
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Drain the stream into memory
    pub async fn collect(mut self) -> Result<Bytes> {
        use futures::StreamExt;

        let mut out = bytes::BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }
}

impl Stream for DownloadStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DownloadStream")
    }
}

/// An in-flight part fetch, aborted if dropped before being joined
struct Prefetch {
    handle: JoinHandle<Result<FetchedPart>>,
}

impl Prefetch {
    fn spawn(fetcher: PartFetcher, number: u32) -> Self {
        debug!(number, "prefetching part");
        Self {
            handle: tokio::spawn(async move { fetcher.fetch_part(number).await }),
        }
    }

    async fn join(mut self) -> Result<FetchedPart> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(join) => Err(Error::Task(join)),
        }
    }
}

impl Drop for Prefetch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
