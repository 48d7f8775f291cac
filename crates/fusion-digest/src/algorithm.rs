//! Checksum algorithm registry
//!
//! Every algorithm exposes the same capability: accumulate bytes, then
//! yield a digest. The service transmits digests base64-encoded, so the
//! CRC family is rendered as big-endian bytes before encoding.

use crate::{DigestError, Result};
use base64::Engine;
use sha2::Digest as _;

/// Default algorithm when a caller does not select one
pub const DEFAULT_ALGORITHM: ChecksumAlgorithm = ChecksumAlgorithm::Sha256;

static CRC32C: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);
static CRC64_NVME: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_NVME);

/// Supported checksum algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// CRC-32 (ISO-HDLC polynomial)
    Crc32,
    /// CRC-32C (iSCSI/Castagnoli polynomial)
    Crc32c,
    /// CRC-64/NVME
    Crc64Nvme,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
    /// MD5 (legacy)
    Md5,
}

impl ChecksumAlgorithm {
    /// Look up an algorithm by name.
    ///
    /// Names are matched case-insensitively with separators ignored, so
    /// `"SHA-256"`, `"sha256"` and `"Sha_256"` all resolve. Unknown names
    /// are rejected here, at selection time.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "CRC32" => Ok(Self::Crc32),
            "CRC32C" => Ok(Self::Crc32c),
            "CRC64NVME" => Ok(Self::Crc64Nvme),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            "MD5" => Ok(Self::Md5),
            _ => Err(DigestError::UnknownAlgorithm(name.to_string())),
        }
    }

    /// Canonical name, as used in `Digest` request headers
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
            Self::Crc64Nvme => "CRC64NVME",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
            Self::Md5 => "MD5",
        }
    }

    /// Lower-case token used in `x-jpmc-checksum-<token>` headers
    pub fn header_suffix(&self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Crc32c => "crc32c",
            Self::Crc64Nvme => "crc64nvme",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }

    /// Create a fresh hasher for this algorithm
    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
            Self::Crc32c => Hasher::Crc32c(CRC32C.digest()),
            Self::Crc64Nvme => Hasher::Crc64Nvme(CRC64_NVME.digest()),
            Self::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Self::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
            Self::Md5 => Hasher::Md5(md5::Md5::new()),
        }
    }
}

impl Default for ChecksumAlgorithm {
    fn default() -> Self {
        DEFAULT_ALGORITHM
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// A running digest computation
///
/// Selected once per producer/verifier instance and fixed for its lifetime.
pub enum Hasher {
    /// CRC-32 state
    Crc32(crc32fast::Hasher),
    /// CRC-32C state
    Crc32c(crc::Digest<'static, u32>),
    /// CRC-64/NVME state
    Crc64Nvme(crc::Digest<'static, u64>),
    /// SHA-1 state
    Sha1(sha1::Sha1),
    /// SHA-256 state
    Sha256(sha2::Sha256),
    /// SHA-512 state
    Sha512(sha2::Sha512),
    /// MD5 state
    Md5(md5::Md5),
}

impl Hasher {
    /// Feed bytes into the running digest
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Crc32(h) => h.update(data),
            Self::Crc32c(h) => h.update(data),
            Self::Crc64Nvme(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    /// Consume the hasher and yield the digest bytes
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Crc32c(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Crc64Nvme(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
            Self::Md5(h) => h.finalize().to_vec(),
        }
    }

    /// Consume the hasher and yield the digest in transmittable form
    pub fn finalize_base64(self) -> String {
        encode_base64(&self.finalize())
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Crc32(_) => "Crc32",
            Self::Crc32c(_) => "Crc32c",
            Self::Crc64Nvme(_) => "Crc64Nvme",
            Self::Sha1(_) => "Sha1",
            Self::Sha256(_) => "Sha256",
            Self::Sha512(_) => "Sha512",
            Self::Md5(_) => "Md5",
        };
        write!(f, "Hasher({name})")
    }
}

/// Encode digest bytes in the transmittable (base64) form
pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_names() {
        for (name, algo) in [
            ("CRC32", ChecksumAlgorithm::Crc32),
            ("crc32c", ChecksumAlgorithm::Crc32c),
            ("CRC64-NVME", ChecksumAlgorithm::Crc64Nvme),
            ("sha-1", ChecksumAlgorithm::Sha1),
            ("SHA-256", ChecksumAlgorithm::Sha256),
            ("sha512", ChecksumAlgorithm::Sha512),
            ("md5", ChecksumAlgorithm::Md5),
        ] {
            assert_eq!(ChecksumAlgorithm::from_name(name).unwrap(), algo);
        }
    }

    #[test]
    fn registry_rejects_unknown_names() {
        let err = ChecksumAlgorithm::from_name("sha3-256").unwrap_err();
        assert!(matches!(err, DigestError::UnknownAlgorithm(_)));
    }

    #[test]
    fn sha256_known_answer() {
        let mut hasher = ChecksumAlgorithm::Sha256.hasher();
        hasher.update(b"foobar");
        assert_eq!(
            hasher.finalize_base64(),
            "w6uP8Tcg6K2QR905Rms8iXTlksL6OD1KOWBxTK7wxPI=",
        );
    }

    #[test]
    fn crc32_known_answer() {
        // CRC-32("123456789") = 0xCBF43926
        let mut hasher = ChecksumAlgorithm::Crc32.hasher();
        hasher.update(b"123456789");
        assert_eq!(hasher.finalize(), 0xCBF4_3926u32.to_be_bytes().to_vec());
    }

    #[test]
    fn crc32c_known_answer() {
        // CRC-32C("123456789") = 0xE3069283
        let mut hasher = ChecksumAlgorithm::Crc32c.hasher();
        hasher.update(b"123456789");
        assert_eq!(hasher.finalize(), 0xE306_9283u32.to_be_bytes().to_vec());
    }

    #[test]
    fn crc64_nvme_known_answer() {
        // CRC-64/NVME("123456789") = 0xAE8B14860A799888
        let mut hasher = ChecksumAlgorithm::Crc64Nvme.hasher();
        hasher.update(b"123456789");
        assert_eq!(
            hasher.finalize(),
            0xAE8B_1486_0A79_9888u64.to_be_bytes().to_vec(),
        );
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let mut split = ChecksumAlgorithm::Sha256.hasher();
        split.update(b"foo");
        split.update(b"bar");

        let mut whole = ChecksumAlgorithm::Sha256.hasher();
        whole.update(b"foobar");

        assert_eq!(split.finalize(), whole.finalize());
    }
}
