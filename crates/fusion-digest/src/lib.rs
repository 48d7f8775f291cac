//! # Fusion Digest
//!
//! Checksum primitives for the Fusion SDK: a pluggable set of digest
//! algorithms, a producer that turns a byte source into a transmittable
//! digest descriptor, and a stream adapter that verifies content integrity
//! as bytes cross the wire.
//!
//! ## Example
//!
//! ```rust
//! use fusion_digest::{ChecksumAlgorithm, DigestProducer};
//!
//! let producer = DigestProducer::default(); // SHA-256
//! let descriptor = producer.digest_bytes("foobar");
//! assert_eq!(
//!     descriptor.encoded(),
//!     "w6uP8Tcg6K2QR905Rms8iXTlksL6OD1KOWBxTK7wxPI=",
//! );
//! # let _ = ChecksumAlgorithm::Sha256;
//! ```

mod algorithm;
mod error;
mod producer;
mod verify;

pub use algorithm::{ChecksumAlgorithm, Hasher, DEFAULT_ALGORITHM};
pub use error::{DigestError, Result};
pub use producer::{DigestDescriptor, DigestProducer};
pub use verify::{Verification, VerifiedStream, VerifyError};
