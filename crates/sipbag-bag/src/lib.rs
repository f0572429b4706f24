//! BagIt-style packages for sipbag.
//!
//! A bag is a directory holding:
//!
//! - `bagit.txt` with the format version and tag encoding
//! - `bag-info.txt` with `key: value` metadata and `Payload-Oxum`
//! - `data/` with every payload file
//! - `manifest-<algo>.txt` listing `<digest> data/<path>` per payload file
//! - `tagmanifest-<algo>.txt` listing digests of the tag files and the
//!   payload manifest
//!
//! [`BagBuilder`] streams payloads through chained digest writers, so no
//! payload is ever held in memory. [`BagVerifier`] recomputes the digests
//! of a finished bag.

pub mod builder;
pub mod error;
pub mod layout;
pub mod verifier;

pub use builder::{Bag, BagBuilder};
pub use error::{BagError, BagResult};
pub use layout::{manifest_name, payload_path, tagmanifest_name};
pub use verifier::{BagVerifier, Mismatch, VerifyReport};
