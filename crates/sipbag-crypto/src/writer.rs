use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::hasher::{DigestAlgorithm, Digester};

/// Receiver for `<digest> <path>` records emitted when a payload stream closes.
pub trait ManifestSink {
    /// Record one checksum line.
    fn record(&mut self, digest_hex: &str, path: &str) -> io::Result<()>;
}

/// Digest of one closed stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestSummary {
    /// Relative path label the stream was opened with.
    pub path: String,
    /// Lowercase hex digest of every byte written.
    pub digest_hex: String,
    /// Number of bytes written to the sink (and hashed).
    pub bytes: u64,
}

/// A writer that hashes everything it forwards to its sink.
///
/// The sink is owned and dropped on [`close`](Self::close). The optional
/// tail is only borrowed: closing writes a single `<digest> <path>` line to
/// it and leaves it open for its owner. Because `close` consumes the writer,
/// writing after close or closing twice does not compile.
pub struct DigestWriter<'t, W: Write> {
    sink: W,
    digester: Digester,
    path: String,
    bytes: u64,
    tail: Option<&'t mut dyn ManifestSink>,
}

impl<'t, W: Write> DigestWriter<'t, W> {
    /// Wrap an already-open sink.
    pub fn open(
        sink: W,
        algorithm: DigestAlgorithm,
        path: impl Into<String>,
        tail: Option<&'t mut dyn ManifestSink>,
    ) -> Self {
        Self {
            sink,
            digester: algorithm.digester(),
            path: path.into(),
            bytes: 0,
            tail,
        }
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\n")
    }

    /// Write a `"<key> <value>"` line.
    pub fn write_property(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.write_line(&format!("{key} {value}"))
    }

    /// Relative path label used in the tail record.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes written (and hashed) so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Algorithm of the running digest.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.digester.algorithm()
    }

    /// Whether closing will emit a tail record.
    pub fn has_tail(&self) -> bool {
        self.tail.is_some()
    }

    /// Flush and release the sink, then forward the digest to the tail.
    pub fn close(self) -> io::Result<DigestSummary> {
        let Self {
            mut sink,
            digester,
            path,
            bytes,
            tail,
        } = self;

        sink.flush()?;
        drop(sink);

        let summary = DigestSummary {
            path,
            digest_hex: digester.finalize_hex(),
            bytes,
        };
        if let Some(tail) = tail {
            tail.record(&summary.digest_hex, &summary.path)?;
        }
        tracing::debug!(path = %summary.path, bytes = summary.bytes, "closed digest stream");
        Ok(summary)
    }
}

impl<'t> DigestWriter<'t, BufWriter<File>> {
    /// Create (or truncate) `file`, creating parent directories as needed.
    pub fn create(
        file: &Path,
        algorithm: DigestAlgorithm,
        path: impl Into<String>,
        tail: Option<&'t mut dyn ManifestSink>,
    ) -> io::Result<Self> {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sink = BufWriter::new(File::create(file)?);
        Ok(Self::open(sink, algorithm, path, tail))
    }
}

impl<W: Write> Write for DigestWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.sink.write(buf)?;
        self.digester.update(&buf[..written]);
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write> ManifestSink for DigestWriter<'_, W> {
    fn record(&mut self, digest_hex: &str, path: &str) -> io::Result<()> {
        self.write_property(digest_hex, path)
    }
}

impl<W: Write> std::fmt::Debug for DigestWriter<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestWriter")
            .field("path", &self.path)
            .field("bytes", &self.bytes)
            .field("algorithm", &self.digester.algorithm())
            .field("tail", &self.tail.is_some())
            .finish()
    }
}
