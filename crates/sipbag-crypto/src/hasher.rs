use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::error::CryptoError;

/// Digest algorithm used for every checksum in one bag.
///
/// The algorithm is a deployment parameter: all payload and tag manifests
/// produced by one run share the same algorithm, rendered as lowercase hex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    /// 128-bit MD5, the BagIt default.
    #[default]
    Md5,
    Sha256,
    Sha512,
    Blake3,
}

impl DigestAlgorithm {
    /// All supported algorithms.
    pub const ALL: [Self; 4] = [Self::Md5, Self::Sha256, Self::Sha512, Self::Blake3];

    /// Canonical lowercase name, as used in manifest file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of a rendered digest in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 | Self::Blake3 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Fresh accumulator for this algorithm.
    pub fn digester(&self) -> Digester {
        match self {
            Self::Md5 => Digester::Md5(md5::Md5::new()),
            Self::Sha256 => Digester::Sha256(sha2::Sha256::new()),
            Self::Sha512 => Digester::Sha512(sha2::Sha512::new()),
            Self::Blake3 => Digester::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// One-shot hex digest of an in-memory buffer.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        let mut digester = self.digester();
        digester.update(data);
        digester.finalize_hex()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        Self::ALL
            .into_iter()
            .find(|algo| algo.name() == normalized)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(value: DigestAlgorithm) -> Self {
        value.name().to_string()
    }
}

/// Rolling digest state for one of the supported algorithms.
///
/// Also usable as an [`io::Write`] sink, so a reader can be hashed with
/// `io::copy` without buffering it.
pub enum Digester {
    Md5(md5::Md5),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Digester {
    /// Feed bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// The algorithm this state belongs to.
    pub fn algorithm(&self) -> DigestAlgorithm {
        match self {
            Self::Md5(_) => DigestAlgorithm::Md5,
            Self::Sha256(_) => DigestAlgorithm::Sha256,
            Self::Sha512(_) => DigestAlgorithm::Sha512,
            Self::Blake3(_) => DigestAlgorithm::Blake3,
        }
    }

    /// Consume the state and render the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => hex::encode(h.finalize().as_bytes()),
        }
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digester({})", self.algorithm())
    }
}

impl io::Write for Digester {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
