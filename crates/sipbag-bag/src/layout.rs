use std::path::Path;

use sipbag_crypto::DigestAlgorithm;

use crate::error::{BagError, BagResult};

pub const BAGIT_FILE: &str = "bagit.txt";
pub const BAG_INFO_FILE: &str = "bag-info.txt";
pub const DATA_DIR: &str = "data";
pub const BAGIT_VERSION: &str = "0.97";
pub const TAG_FILE_ENCODING: &str = "UTF-8";
pub const PAYLOAD_OXUM: &str = "Payload-Oxum";

/// `manifest-<algo>.txt`
pub fn manifest_name(algorithm: DigestAlgorithm) -> String {
    format!("manifest-{}.txt", algorithm.name())
}

/// `tagmanifest-<algo>.txt`
pub fn tagmanifest_name(algorithm: DigestAlgorithm) -> String {
    format!("tagmanifest-{}.txt", algorithm.name())
}

/// Check a payload path relative to `data/` and normalize it to `/` form.
///
/// Rejects empty paths, absolute paths, and any `.` or `..` component.
pub fn payload_path(rel: &str) -> BagResult<String> {
    let trimmed = rel.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') || trimmed.contains('\\') {
        return Err(BagError::InvalidPath(rel.to_string()));
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return Err(BagError::InvalidPath(rel.to_string()));
    }
    Ok(parts.join("/"))
}

/// Path of `file` below `root` using `/` separators, as manifests list it.
pub(crate) fn relative_label(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_names_follow_algorithm() {
        assert_eq!(manifest_name(DigestAlgorithm::Md5), "manifest-md5.txt");
        assert_eq!(tagmanifest_name(DigestAlgorithm::Sha256), "tagmanifest-sha256.txt");
    }

    #[test]
    fn payload_path_accepts_nested() {
        assert_eq!(payload_path("ORIGINAL/1").unwrap(), "ORIGINAL/1");
        assert_eq!(payload_path("object").unwrap(), "object");
    }

    #[test]
    fn payload_path_rejects_escapes() {
        for bad in ["", "  ", "/etc/passwd", "../x", "a/../b", "a//b", "./a", "a\\b"] {
            assert!(payload_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn relative_label_uses_forward_slashes() {
        let root = Path::new("/bags/one");
        let file = root.join("data").join("ORIGINAL").join("1");
        assert_eq!(relative_label(root, &file).unwrap(), "data/ORIGINAL/1");
        assert!(relative_label(root, Path::new("/elsewhere")).is_none());
    }
}
