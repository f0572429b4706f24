use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::error::{MigrateError, MigrateResult};
use crate::traits::UploadTarget;

/// Upload log written by [`DirectoryTarget`], one `<dir> <locator>` per line.
pub const UPLOAD_LOG: &str = "uploads.txt";

/// Delivers packages into a local drop directory.
///
/// Each upload is staged under a hidden `.<package>.partial` directory, then
/// renamed to `<root>/<NNNN>-<package>/` and appended to [`UPLOAD_LOG`] with
/// the locator it was addressed to, so a downstream ingester can replay them
/// in order. A failed copy leaves neither a numbered directory nor a log line.
#[derive(Debug)]
pub struct DirectoryTarget {
    root: PathBuf,
    next: AtomicUsize,
}

impl DirectoryTarget {
    /// Open (or create) the drop directory. Numbering continues after any
    /// deliveries already present; hidden staging directories do not count.
    pub fn new(root: &Path) -> MigrateResult<Self> {
        std::fs::create_dir_all(root)?;
        let mut existing = 0;
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && !entry.file_name().to_string_lossy().starts_with('.') {
                existing += 1;
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            next: AtomicUsize::new(existing + 1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl UploadTarget for DirectoryTarget {
    async fn upload(&self, package: &Path, locator: &str) -> MigrateResult<()> {
        if !package.is_dir() {
            return Err(MigrateError::NotFound(format!("package {}", package.display())));
        }
        let name = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MigrateError::InvalidOperation(format!("bad package path {}", package.display())))?;

        let staging = self.root.join(format!(".{name}.partial"));
        let (src, dest) = (package.to_path_buf(), staging.clone());
        let copied = tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
            .await
            .map_err(std::io::Error::other)?;
        if let Err(err) = copied {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                tracing::warn!(path = %staging.display(), error = %cleanup, "staging directory left behind");
            }
            return Err(err);
        }

        let seq = self.next.fetch_add(1, Ordering::SeqCst);
        let slot = format!("{seq:04}-{name}");
        tokio::fs::rename(&staging, self.root.join(&slot)).await?;

        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(UPLOAD_LOG))
            .await?;
        log.write_all(format!("{slot} {locator}\n").as_bytes()).await?;
        log.flush().await?;

        tracing::debug!(%slot, %locator, "package delivered");
        Ok(())
    }
}

/// Copy the tree at `src` to a fresh `dest`. Runs off the async runtime.
fn copy_tree(src: &Path, dest: &Path) -> MigrateResult<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| MigrateError::InvalidOperation(e.to_string()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Keeps every upload in memory; optionally fails the first few calls.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    uploads: Mutex<Vec<(PathBuf, String)>>,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target whose first `n` uploads fail.
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    /// Successful uploads in call order.
    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().expect("recording mutex poisoned").clone()
    }

    /// Number of upload calls, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadTarget for RecordingTarget {
    async fn upload(&self, package: &Path, locator: &str) -> MigrateResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MigrateError::InvalidOperation("simulated upload failure".into()));
        }
        self.uploads
            .lock()
            .expect("recording mutex poisoned")
            .push((package.to_path_buf(), locator.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(dir: &Path, name: &str) -> PathBuf {
        let pkg = dir.join(name);
        std::fs::create_dir_all(pkg.join("data")).unwrap();
        std::fs::write(pkg.join("bagit.txt"), b"BagIt-Version: 0.97\n").unwrap();
        std::fs::write(pkg.join("data/object"), b"objectType item\n").unwrap();
        pkg
    }

    #[tokio::test]
    async fn directory_target_copies_and_logs() {
        let src = tempfile::tempdir().unwrap();
        let drop_dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();

        let a = package(src.path(), "1721.1-1");
        let b = package(src.path(), "1721.1-2");
        target.upload(&a, "http://t/package/COMMUNITY-sip").await.unwrap();
        target.upload(&b, "http://t/1721.1/1/package/COLLECTION-sip").await.unwrap();

        assert!(drop_dir.path().join("0001-1721.1-1/data/object").is_file());
        assert!(drop_dir.path().join("0002-1721.1-2/bagit.txt").is_file());
        let log = std::fs::read_to_string(drop_dir.path().join(UPLOAD_LOG)).unwrap();
        assert_eq!(
            log,
            "0001-1721.1-1 http://t/package/COMMUNITY-sip\n0002-1721.1-2 http://t/1721.1/1/package/COLLECTION-sip\n"
        );
    }

    #[tokio::test]
    async fn directory_target_resumes_numbering() {
        let src = tempfile::tempdir().unwrap();
        let drop_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(drop_dir.path().join("0001-old")).unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();
        target.upload(&package(src.path(), "p"), "loc").await.unwrap();
        assert!(drop_dir.path().join("0002-p").is_dir());
    }

    #[tokio::test]
    async fn staging_directories_do_not_count_as_deliveries() {
        let src = tempfile::tempdir().unwrap();
        let drop_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(drop_dir.path().join(".p.partial")).unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();
        target.upload(&package(src.path(), "p"), "loc").await.unwrap();
        assert!(drop_dir.path().join("0001-p").is_dir());
        assert!(!drop_dir.path().join(".p.partial").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_copy_leaves_no_slot_and_no_log_line() {
        let src = tempfile::tempdir().unwrap();
        let drop_dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();

        let broken = package(src.path(), "broken");
        std::os::unix::fs::symlink(src.path().join("nowhere"), broken.join("data/dangling")).unwrap();
        assert!(target.upload(&broken, "loc").await.is_err());

        let names: Vec<_> = std::fs::read_dir(drop_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(names.is_empty(), "{names:?}");

        target.upload(&package(src.path(), "good"), "loc").await.unwrap();
        assert!(drop_dir.path().join("0001-good").is_dir());
        let log = std::fs::read_to_string(drop_dir.path().join(UPLOAD_LOG)).unwrap();
        assert_eq!(log, "0001-good loc\n");
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let drop_dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();
        let err = target.upload(&drop_dir.path().join("nope"), "loc").await.unwrap_err();
        assert!(matches!(err, MigrateError::NotFound(_)));
    }

    #[tokio::test]
    async fn recording_target_fails_then_records() {
        let target = RecordingTarget::failing(1);
        assert!(target.upload(Path::new("p"), "l").await.is_err());
        target.upload(Path::new("p"), "l").await.unwrap();
        assert_eq!(target.calls(), 2);
        assert_eq!(target.uploads(), vec![(PathBuf::from("p"), "l".to_string())]);
    }
}
