use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use sipbag_crypto::{DigestAlgorithm, DigestSummary, DigestWriter, ManifestSink};
use walkdir::WalkDir;

use crate::error::{BagError, BagResult};
use crate::layout::{
    manifest_name, payload_path, tagmanifest_name, BAGIT_FILE, BAGIT_VERSION, BAG_INFO_FILE,
    DATA_DIR, PAYLOAD_OXUM, TAG_FILE_ENCODING,
};

/// Result of finishing a bag.
#[derive(Clone, Debug)]
pub struct Bag {
    pub root: PathBuf,
    pub algorithm: DigestAlgorithm,
    pub payload_files: u64,
    pub payload_bytes: u64,
    /// Digest of the payload manifest, as recorded in the tag manifest.
    pub payload_manifest: DigestSummary,
    pub tag_manifest: DigestSummary,
}

impl Bag {
    /// `Payload-Oxum` value: `<bytes>.<file count>`.
    pub fn oxum(&self) -> String {
        format!("{}.{}", self.payload_bytes, self.payload_files)
    }
}

/// Writes one bag directory.
///
/// Every payload stream is chained to the payload manifest, which receives
/// one `<digest> data/<path>` line when the stream closes. Tag files are
/// written on [`finish`](Self::finish) and chained to the tag manifest the
/// same way.
pub struct BagBuilder {
    root: PathBuf,
    algorithm: DigestAlgorithm,
    payload_manifest: DigestWriter<'static, BufWriter<File>>,
    payload_paths: HashSet<String>,
    info: Vec<(String, String)>,
    properties: Vec<(String, Vec<(String, String)>)>,
}

impl BagBuilder {
    /// Start a bag at `root`, creating the directory if needed.
    pub fn create(root: &Path, algorithm: DigestAlgorithm) -> BagResult<Self> {
        if root.join(BAGIT_FILE).exists() {
            return Err(BagError::AlreadyExists(root.to_path_buf()));
        }
        std::fs::create_dir_all(root.join(DATA_DIR))?;

        let name = manifest_name(algorithm);
        let payload_manifest = DigestWriter::create(&root.join(&name), algorithm, name, None)?;
        tracing::debug!(root = %root.display(), %algorithm, "bag started");

        Ok(Self {
            root: root.to_path_buf(),
            algorithm,
            payload_manifest,
            payload_paths: HashSet::new(),
            info: Vec::new(),
            properties: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Add a `bag-info.txt` entry. Keys may repeat.
    pub fn metadata(&mut self, key: &str, value: &str) -> &mut Self {
        self.info.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a `key value` line to the property file `data/<rel>`.
    ///
    /// Property files are written when the bag finishes, in insertion order.
    pub fn property(&mut self, rel: &str, key: &str, value: &str) -> BagResult<&mut Self> {
        let rel = payload_path(rel)?;
        let pair = (key.to_string(), value.to_string());
        match self.properties.iter_mut().find(|(path, _)| *path == rel) {
            Some((_, pairs)) => pairs.push(pair),
            None => self.properties.push((rel, vec![pair])),
        }
        Ok(self)
    }

    /// Open a payload stream for `data/<rel>`.
    ///
    /// The stream borrows the builder; close it before opening the next one.
    pub fn payload_stream(&mut self, rel: &str) -> BagResult<DigestWriter<'_, BufWriter<File>>> {
        let rel = payload_path(rel)?;
        if !self.payload_paths.insert(rel.clone()) {
            return Err(BagError::DuplicatePayload(rel));
        }
        let file = self.root.join(DATA_DIR).join(&rel);
        let label = format!("{DATA_DIR}/{rel}");
        let algorithm = self.algorithm;
        let tail: &mut dyn ManifestSink = &mut self.payload_manifest;
        Ok(DigestWriter::create(&file, algorithm, label, Some(tail))?)
    }

    /// Copy `reader` into `data/<rel>`.
    pub fn payload<R: Read>(&mut self, rel: &str, mut reader: R) -> BagResult<DigestSummary> {
        let mut stream = self.payload_stream(rel)?;
        io::copy(&mut reader, &mut stream)?;
        Ok(stream.close()?)
    }

    /// Write property files and tag files, then close both manifests.
    pub fn finish(mut self) -> BagResult<Bag> {
        for (rel, pairs) in std::mem::take(&mut self.properties) {
            let mut stream = self.payload_stream(&rel)?;
            for (key, value) in &pairs {
                stream.write_property(key, value)?;
            }
            stream.close()?;
        }

        let Self {
            root,
            algorithm,
            payload_manifest,
            info,
            ..
        } = self;
        let payload_manifest = payload_manifest.close()?;
        let (payload_files, payload_bytes) = payload_totals(&root.join(DATA_DIR))?;

        let tag_name = tagmanifest_name(algorithm);
        let mut tag_manifest = DigestWriter::create(&root.join(&tag_name), algorithm, tag_name, None)?;

        let tail: &mut dyn ManifestSink = &mut tag_manifest;
        let mut bagit = DigestWriter::create(&root.join(BAGIT_FILE), algorithm, BAGIT_FILE, Some(tail))?;
        bagit.write_line(&format!("BagIt-Version: {BAGIT_VERSION}"))?;
        bagit.write_line(&format!("Tag-File-Character-Encoding: {TAG_FILE_ENCODING}"))?;
        bagit.close()?;

        let tail: &mut dyn ManifestSink = &mut tag_manifest;
        let mut bag_info = DigestWriter::create(&root.join(BAG_INFO_FILE), algorithm, BAG_INFO_FILE, Some(tail))?;
        for (key, value) in &info {
            bag_info.write_line(&format!("{key}: {value}"))?;
        }
        bag_info.write_line(&format!("{PAYLOAD_OXUM}: {payload_bytes}.{payload_files}"))?;
        bag_info.close()?;

        tag_manifest.record(&payload_manifest.digest_hex, &payload_manifest.path)?;
        let tag_manifest = tag_manifest.close()?;

        tracing::info!(
            root = %root.display(),
            files = payload_files,
            bytes = payload_bytes,
            "bag finished"
        );
        Ok(Bag {
            root,
            algorithm,
            payload_files,
            payload_bytes,
            payload_manifest,
            tag_manifest,
        })
    }
}

/// Count payload files and their total size.
pub(crate) fn payload_totals(data_dir: &Path) -> BagResult<(u64, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(data_dir) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files += 1;
            bytes += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok((files, bytes))
}

impl std::fmt::Debug for BagBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagBuilder")
            .field("root", &self.root)
            .field("algorithm", &self.algorithm)
            .field("payloads", &self.payload_paths.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn read(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn writes_full_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bag");
        let mut bag = BagBuilder::create(&root, DigestAlgorithm::Md5).unwrap();
        bag.metadata("bagType", "SIP");
        bag.payload("ORIGINAL/1", &b"hello"[..]).unwrap();
        bag.property("object", "objectType", "item").unwrap();
        bag.property("object", "objectId", "1721.1/3").unwrap();
        let bag = bag.finish().unwrap();

        assert_eq!(
            read(&root, "bagit.txt"),
            "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n"
        );
        assert_eq!(read(&root, "data/ORIGINAL/1"), "hello");
        assert_eq!(read(&root, "data/object"), "objectType item\nobjectId 1721.1/3\n");

        let object_len = "objectType item\nobjectId 1721.1/3\n".len() as u64;
        assert_eq!(bag.payload_files, 2);
        assert_eq!(bag.payload_bytes, 5 + object_len);
        assert_eq!(
            read(&root, "bag-info.txt"),
            format!("bagType: SIP\nPayload-Oxum: {}\n", bag.oxum())
        );

        let manifest = read(&root, "manifest-md5.txt");
        assert!(manifest.starts_with("5d41402abc4b2a76b9719d911017c592 data/ORIGINAL/1\n"));
        assert!(manifest.contains(" data/object\n"));
        assert_eq!(manifest.lines().count(), 2);
    }

    #[test]
    fn tag_manifest_covers_tag_files_and_payload_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = BagBuilder::create(dir.path(), DigestAlgorithm::Sha256).unwrap();
        bag.payload("a.txt", &b"abc"[..]).unwrap();
        let bag = bag.finish().unwrap();

        let tags = read(dir.path(), "tagmanifest-sha256.txt");
        let paths: Vec<&str> = tags.lines().filter_map(|l| l.split_once(' ').map(|(_, p)| p)).collect();
        assert_eq!(paths, vec!["bagit.txt", "bag-info.txt", "manifest-sha256.txt"]);

        let manifest_bytes = std::fs::read(dir.path().join("manifest-sha256.txt")).unwrap();
        assert_eq!(bag.payload_manifest.digest_hex, DigestAlgorithm::Sha256.hex_digest(&manifest_bytes));
        assert!(tags.ends_with(&format!("{} manifest-sha256.txt\n", bag.payload_manifest.digest_hex)));
    }

    #[test]
    fn streaming_payload_records_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = BagBuilder::create(dir.path(), DigestAlgorithm::Md5).unwrap();
        {
            let mut stream = bag.payload_stream("big.bin").unwrap();
            for _ in 0..100 {
                stream.write_all(&[7u8; 1024]).unwrap();
            }
            let summary = stream.close().unwrap();
            assert_eq!(summary.bytes, 100 * 1024);
            assert_eq!(summary.path, "data/big.bin");
        }
        let bag = bag.finish().unwrap();
        assert_eq!(bag.oxum(), "102400.1");
    }

    #[test]
    fn empty_bag_has_zero_oxum() {
        let dir = tempfile::tempdir().unwrap();
        let bag = BagBuilder::create(dir.path(), DigestAlgorithm::Md5).unwrap().finish().unwrap();
        assert_eq!(bag.oxum(), "0.0");
        assert_eq!(read(dir.path(), "manifest-md5.txt"), "");
    }

    #[test]
    fn duplicate_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = BagBuilder::create(dir.path(), DigestAlgorithm::Md5).unwrap();
        bag.payload("x", &b"1"[..]).unwrap();
        assert!(matches!(bag.payload("x", &b"2"[..]), Err(BagError::DuplicatePayload(_))));
    }

    #[test]
    fn escaping_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = BagBuilder::create(dir.path(), DigestAlgorithm::Md5).unwrap();
        assert!(matches!(bag.payload("../oops", &b""[..]), Err(BagError::InvalidPath(_))));
        assert!(bag.property("/abs", "k", "v").is_err());
    }

    #[test]
    fn existing_bag_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        BagBuilder::create(dir.path(), DigestAlgorithm::Md5).unwrap().finish().unwrap();
        assert!(matches!(
            BagBuilder::create(dir.path(), DigestAlgorithm::Md5),
            Err(BagError::AlreadyExists(_))
        ));
    }
}
