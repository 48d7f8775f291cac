//! Stream integrity verification

use crate::algorithm::{ChecksumAlgorithm, Hasher};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use thiserror::Error;

/// What to do with the accumulated digest once the source is exhausted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Compare against this expected base64 digest; mismatch fails the
    /// exhausting read with a corruption error
    Expect(String),
    /// Compute but never compare. For callers that intentionally tolerate
    /// missing or irrelevant checksums; never fails regardless of content.
    Skip,
}

impl Verification {
    /// Expect the given base64 digest
    pub fn expect(digest: impl Into<String>) -> Self {
        Self::Expect(digest.into())
    }

    /// Whether comparison is disabled
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Verification failure, kept distinct from source (transport) errors
#[derive(Error, Debug)]
pub enum VerifyError<E> {
    /// The accumulated digest did not match the expected value
    #[error("corrupted stream, checksum verification failed (expected {expected}, got {actual})")]
    Corrupted {
        /// Digest supplied at construction
        expected: String,
        /// Digest actually accumulated
        actual: String,
    },

    /// The underlying source failed
    #[error(transparent)]
    Source(E),
}

impl<E> VerifyError<E> {
    /// Whether this is a corruption failure rather than a source failure
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

pin_project! {
    /// Transparent pass-through over a byte stream that feeds every chunk
    /// into a running digest and, when the source is exhausted, compares
    /// the result against the expected value.
    ///
    /// An empty source is not an error: the stream yields end-of-data,
    /// subject to the same final comparison. After the terminal item the
    /// stream is fused and keeps yielding `None`.
    pub struct VerifiedStream<S> {
        #[pin]
        inner: S,
        hasher: Option<Hasher>,
        verification: Verification,
        done: bool,
    }
}

impl<S> VerifiedStream<S> {
    /// Wrap a source, accumulating a digest with the given algorithm
    pub fn new(inner: S, algorithm: ChecksumAlgorithm, verification: Verification) -> Self {
        Self {
            inner,
            hasher: Some(algorithm.hasher()),
            verification,
            done: false,
        }
    }
}

impl<S, E> Stream for VerifiedStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, VerifyError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                if let Some(hasher) = this.hasher.as_mut() {
                    hasher.update(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.done = true;
                Poll::Ready(Some(Err(VerifyError::Source(e))))
            }
            None => {
                *this.done = true;
                let actual = match this.hasher.take() {
                    Some(hasher) => hasher.finalize_base64(),
                    None => return Poll::Ready(None),
                };
                match this.verification {
                    Verification::Expect(expected) if *expected != actual => {
                        Poll::Ready(Some(Err(VerifyError::Corrupted {
                            expected: expected.clone(),
                            actual,
                        })))
                    }
                    _ => Poll::Ready(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt, TryStreamExt};
    use std::convert::Infallible;

    const FOOBAR_SHA256: &str = "w6uP8Tcg6K2QR905Rms8iXTlksL6OD1KOWBxTK7wxPI=";

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn matching_digest_passes_through() {
        let verified = VerifiedStream::new(
            chunks(&[b"foo", b"bar"]),
            ChecksumAlgorithm::Sha256,
            Verification::expect(FOOBAR_SHA256),
        );
        let collected: Vec<Bytes> = verified.try_collect().await.unwrap();
        assert_eq!(collected.concat(), b"foobar");
    }

    #[tokio::test]
    async fn mismatch_fails_the_exhausting_read() {
        let mut verified = VerifiedStream::new(
            chunks(&[b"foo", b"bar"]),
            ChecksumAlgorithm::Sha256,
            Verification::expect("dodgy-checksum"),
        );

        // Content reads behave transparently until exhaustion.
        assert_eq!(verified.next().await.unwrap().unwrap(), "foo");
        assert_eq!(verified.next().await.unwrap().unwrap(), "bar");

        let err = verified.next().await.unwrap().unwrap_err();
        assert!(err.is_corruption());
        assert!(err
            .to_string()
            .contains("corrupted stream, checksum verification failed"));

        // Fused after the terminal item.
        assert!(verified.next().await.is_none());
    }

    #[tokio::test]
    async fn skip_mode_never_compares() {
        let verified = VerifiedStream::new(
            chunks(&[b"foo", b"bar"]),
            ChecksumAlgorithm::Sha256,
            Verification::Skip,
        );
        let collected: Vec<Bytes> = verified.try_collect().await.unwrap();
        assert_eq!(collected.concat(), b"foobar");
    }

    #[tokio::test]
    async fn empty_source_yields_end_of_data() {
        let mut verified = VerifiedStream::new(
            chunks(&[]),
            ChecksumAlgorithm::Sha256,
            Verification::Skip,
        );
        assert!(verified.next().await.is_none());
    }

    #[tokio::test]
    async fn source_error_is_not_corruption() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"foo")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let mut verified = VerifiedStream::new(
            source,
            ChecksumAlgorithm::Sha256,
            Verification::expect(FOOBAR_SHA256),
        );

        assert!(verified.next().await.unwrap().is_ok());
        let err = verified.next().await.unwrap().unwrap_err();
        assert!(!err.is_corruption());
        assert!(matches!(err, VerifyError::Source(_)));
    }
}
