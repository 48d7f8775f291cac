//! # Fusion Client SDK
//!
//! A client SDK for the Fusion catalog and data-distribution REST service:
//! metadata listings plus a resilient multipart transfer engine that moves
//! large binary distributions between the local filesystem/memory and the
//! service with per-chunk integrity verification, bounded concurrency, and
//! all-or-nothing multipart sessions.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fusion_client::{Config, Credentials, DownloadRequest, FusionClient, OAuthTokenProvider};
//!
//! #[tokio::main]
//! async fn main() -> fusion_client::Result<()> {
//!     let tokens = OAuthTokenProvider::new(Credentials::Bearer {
//!         token: "your-bearer-token".to_string(),
//!     })?;
//!     let client = FusionClient::new(Config::default(), Arc::new(tokens))?;
//!
//!     // Browse the catalog hierarchy
//!     for catalog in client.list_catalogs().await? {
//!         println!("{}", catalog.identifier);
//!     }
//!
//!     // Download a distribution to disk
//!     let request = DownloadRequest::new("common", "FXO_SP", "20260807", "csv")?;
//!     let written = client.download_to_file(&request, "fxo_sp.csv").await?;
//!     println!("wrote {written} bytes");
//!
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod compose;
mod config;
mod error;
mod head;
mod pool;
mod request;
mod session;
mod transfer;
mod types;
mod wire;

pub use auth::{Credentials, OAuthTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::FusionClient;
pub use compose::DownloadStream;
pub use config::Config;
pub use error::{Error, Result};
pub use head::RemoteObjectHead;
pub use request::{DistributionDates, DownloadRequest, UploadRequest};
pub use types::*;

// Re-export the digest surface callers need to configure verification.
pub use fusion_digest::{ChecksumAlgorithm, DigestDescriptor, DigestProducer, Verification};
