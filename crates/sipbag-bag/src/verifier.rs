use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use sipbag_crypto::DigestAlgorithm;
use walkdir::WalkDir;

use crate::builder::payload_totals;
use crate::error::{BagError, BagResult};
use crate::layout::{
    manifest_name, payload_path, relative_label, tagmanifest_name, BAGIT_FILE, BAG_INFO_FILE, DATA_DIR,
    PAYLOAD_OXUM,
};

/// A listed file whose content no longer matches its recorded digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Outcome of checking a bag against its manifests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Files whose digest was recomputed.
    pub checked: usize,
    /// Listed in a manifest but absent on disk.
    pub missing: Vec<String>,
    pub mismatched: Vec<Mismatch>,
    /// Payload files present on disk but not in the payload manifest.
    pub unlisted: Vec<String>,
    /// `(declared, actual)` when `Payload-Oxum` disagrees with the payload.
    pub oxum_mismatch: Option<(String, String)>,
}

impl VerifyReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
            && self.mismatched.is_empty()
            && self.unlisted.is_empty()
            && self.oxum_mismatch.is_none()
    }
}

/// Recomputes digests of an existing bag.
#[derive(Clone, Debug)]
pub struct BagVerifier {
    root: PathBuf,
    algorithm: DigestAlgorithm,
}

impl BagVerifier {
    /// Open the bag at `root`, detecting its digest algorithm from the
    /// payload manifest name.
    pub fn open(root: &Path) -> BagResult<Self> {
        if !root.join(BAGIT_FILE).is_file() {
            return Err(BagError::NotABag(root.to_path_buf()));
        }
        let algorithm = DigestAlgorithm::ALL
            .into_iter()
            .find(|a| root.join(manifest_name(*a)).is_file())
            .ok_or_else(|| BagError::NotABag(root.to_path_buf()))?;
        Ok(Self {
            root: root.to_path_buf(),
            algorithm,
        })
    }

    /// Open with a known algorithm.
    pub fn with_algorithm(root: &Path, algorithm: DigestAlgorithm) -> BagResult<Self> {
        if !root.join(manifest_name(algorithm)).is_file() {
            return Err(BagError::NotABag(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            algorithm,
        })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Entries of `bag-info.txt` in file order.
    pub fn bag_info(&self) -> BagResult<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for (idx, line) in read_lines(&self.root.join(BAG_INFO_FILE))?.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| BagError::Malformed {
                file: BAG_INFO_FILE.into(),
                line: idx + 1,
                reason: "missing ':'".into(),
            })?;
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(entries)
    }

    /// Parse a manifest file into `path -> digest`.
    ///
    /// Payload manifests may only list `data/<path>`; tag manifests may
    /// only list file names at the bag root.
    pub fn manifest(&self, name: &str) -> BagResult<BTreeMap<String, String>> {
        let tag = name.starts_with("tagmanifest-");
        let mut listed = BTreeMap::new();
        for (idx, line) in read_lines(&self.root.join(name))?.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (digest, path) = line.split_once(' ').ok_or_else(|| BagError::Malformed {
                file: name.to_string(),
                line: idx + 1,
                reason: "expected '<digest> <path>'".into(),
            })?;
            let path = path.trim_start();
            if !listed_path_ok(path, tag) {
                return Err(BagError::Malformed {
                    file: name.to_string(),
                    line: idx + 1,
                    reason: format!("path {path:?} is outside the bag's {}", if tag { "root" } else { "payload" }),
                });
            }
            listed.insert(path.to_string(), digest.to_ascii_lowercase());
        }
        Ok(listed)
    }

    /// Check payload and tag manifests plus `Payload-Oxum`.
    pub fn verify(&self) -> BagResult<VerifyReport> {
        let mut report = VerifyReport::default();

        let payload = self.manifest(&manifest_name(self.algorithm))?;
        self.check_listed(&payload, &mut report)?;

        let tag_name = tagmanifest_name(self.algorithm);
        if self.root.join(&tag_name).is_file() {
            let tags = self.manifest(&tag_name)?;
            self.check_listed(&tags, &mut report)?;
        }

        for entry in WalkDir::new(self.root.join(DATA_DIR)).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(label) = relative_label(&self.root, entry.path()) {
                if !payload.contains_key(&label) {
                    report.unlisted.push(label);
                }
            }
        }

        let declared = self
            .bag_info()?
            .into_iter()
            .find(|(key, _)| key == PAYLOAD_OXUM)
            .map(|(_, value)| value);
        if let Some(declared) = declared {
            let (files, bytes) = payload_totals(&self.root.join(DATA_DIR))?;
            let actual = format!("{bytes}.{files}");
            if declared != actual {
                report.oxum_mismatch = Some((declared, actual));
            }
        }

        if report.is_valid() {
            tracing::info!(root = %self.root.display(), checked = report.checked, "bag verified");
        } else {
            tracing::warn!(
                root = %self.root.display(),
                missing = report.missing.len(),
                mismatched = report.mismatched.len(),
                unlisted = report.unlisted.len(),
                "bag failed verification"
            );
        }
        Ok(report)
    }

    fn check_listed(&self, listed: &BTreeMap<String, String>, report: &mut VerifyReport) -> BagResult<()> {
        for (path, expected) in listed {
            let file = self.root.join(path);
            if !file.is_file() {
                report.missing.push(path.clone());
                continue;
            }
            let actual = self.digest_file(&file)?;
            report.checked += 1;
            if &actual != expected {
                tracing::debug!(%path, %expected, %actual, "digest mismatch");
                report.mismatched.push(Mismatch {
                    path: path.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn digest_file(&self, file: &Path) -> BagResult<String> {
        let mut digester = self.algorithm.digester();
        io::copy(&mut File::open(file)?, &mut digester)?;
        Ok(digester.finalize_hex())
    }
}

fn listed_path_ok(path: &str, tag: bool) -> bool {
    if tag {
        return !path.contains('/') && payload_path(path).is_ok();
    }
    path.strip_prefix(DATA_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| payload_path(rest).is_ok_and(|normal| normal == rest))
}

fn read_lines(path: &Path) -> BagResult<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().collect::<io::Result<Vec<_>>>()?)
}
