//! Checksummed streaming primitives for sipbag.
//!
//! Provides [`DigestWriter`], a writer that hashes every byte it forwards to
//! its sink and, on close, reports `<digest> <path>` to an optional tail
//! [`ManifestSink`]. Chaining payload writers to a manifest writer builds
//! bag manifests without buffering payloads in memory.
//!
//! All digests wrap established libraries (RustCrypto `md-5`/`sha2`, BLAKE3).

pub mod error;
pub mod hasher;
pub mod writer;

pub use error::{CryptoError, CryptoResult};
pub use hasher::{DigestAlgorithm, Digester};
pub use writer::{DigestSummary, DigestWriter, ManifestSink};
