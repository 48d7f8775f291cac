//! Digest production over buffered sources

use crate::algorithm::{encode_base64, ChecksumAlgorithm};
use crate::Result;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// An immutable descriptor of fully-buffered content: the bytes, their
/// size, and their digest in raw and transmittable forms.
///
/// Owned exclusively by the caller that requested it; suitable both for
/// network transmission (`encoded` goes into the `Digest` header) and for
/// later re-verification.
#[derive(Clone, Debug)]
pub struct DigestDescriptor {
    data: Bytes,
    size: u64,
    digest: Vec<u8>,
    encoded: String,
}

impl DigestDescriptor {
    /// The buffered content
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Content size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Raw digest bytes
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Digest in transmittable (base64) form
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Digest as a hex string
    pub fn hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Consume the descriptor, keeping only the content
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// Buffers an input source fully, computing size and checksum.
///
/// The algorithm is selected once at construction and fixed for the
/// producer's lifetime. Inputs are bounded by memory, which is why
/// single-part transfer size is capped by configuration.
#[derive(Clone, Copy, Debug)]
pub struct DigestProducer {
    algorithm: ChecksumAlgorithm,
}

impl DigestProducer {
    /// Create a producer for the given algorithm
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Create a producer by algorithm name, rejecting unknown names here
    /// rather than at use
    pub fn with_name(name: &str) -> Result<Self> {
        Ok(Self::new(ChecksumAlgorithm::from_name(name)?))
    }

    /// The algorithm this producer computes
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Digest content that is already in memory
    pub fn digest_bytes(&self, data: impl Into<Bytes>) -> DigestDescriptor {
        let data = data.into();
        let mut hasher = self.algorithm.hasher();
        hasher.update(&data);
        let digest = hasher.finalize();
        let encoded = encode_base64(&digest);

        DigestDescriptor {
            size: data.len() as u64,
            data,
            digest,
            encoded,
        }
    }

    /// Consume a reader to exhaustion and digest its content
    pub async fn digest_reader<R>(&self, mut reader: R) -> Result<DigestDescriptor>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(self.digest_bytes(buf))
    }
}

impl Default for DigestProducer {
    fn default() -> Self {
        Self::new(ChecksumAlgorithm::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DigestError;

    #[test]
    fn default_is_sha256() {
        let descriptor = DigestProducer::default().digest_bytes("foobar");
        assert_eq!(descriptor.size(), 6);
        assert_eq!(
            descriptor.encoded(),
            "w6uP8Tcg6K2QR905Rms8iXTlksL6OD1KOWBxTK7wxPI=",
        );
        assert_eq!(
            descriptor.hex(),
            "c3ab8ff13720e8ad9047dd39466b3c8974e592c2fa383d4a3960714caef0c4f2",
        );
    }

    #[test]
    fn with_name_rejects_unknown_algorithm() {
        let err = DigestProducer::with_name("whirlpool").unwrap_err();
        assert!(matches!(err, DigestError::UnknownAlgorithm(_)));
    }

    #[tokio::test]
    async fn reader_matches_bytes() {
        let producer = DigestProducer::default();
        let from_reader = producer.digest_reader(&b"foobar"[..]).await.unwrap();
        let from_bytes = producer.digest_bytes("foobar");
        assert_eq!(from_reader.digest(), from_bytes.digest());
        assert_eq!(from_reader.data(), from_bytes.data());
    }

    #[tokio::test]
    async fn empty_reader_is_not_an_error() {
        let descriptor = DigestProducer::default()
            .digest_reader(tokio::io::empty())
            .await
            .unwrap();
        assert_eq!(descriptor.size(), 0);
        // SHA-256 of the empty string
        assert_eq!(
            descriptor.encoded(),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=",
        );
    }
}
