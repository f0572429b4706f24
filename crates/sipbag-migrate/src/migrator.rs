use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sipbag_manifest::{HierarchySource, ManifestBuilder, TreeManifest};

use crate::config::MigrateConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::locator::target_locator;
use crate::package::PackageMaker;
use crate::traits::{ContentSource, UploadTarget};

/// What part of the source repository to export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every top-level community and everything below.
    All,
    /// One community or collection, preceded by its ancestors.
    Identifier(String),
}

impl FromStr for Scope {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(MigrateError::Config("empty export scope".into())),
            "all" => Ok(Self::All),
            id => Ok(Self::Identifier(id.to_string())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Identifier(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportSummary {
    pub manifest_path: PathBuf,
    pub entries: usize,
    pub packages: Vec<PathBuf>,
}

/// One delivered package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub package: PathBuf,
    pub locator: String,
    pub attempts: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ImportSummary {
    pub deliveries: Vec<Delivery>,
}

impl ImportSummary {
    /// Attempts beyond the first, summed over all packages.
    pub fn retries(&self) -> u32 {
        self.deliveries.iter().map(|d| d.attempts - 1).sum()
    }
}

/// Drives a migration: manifest build, package build, ordered upload.
///
/// Export and import are independent; an import run reloads the manifest
/// from the scratch directory when it was not built in the same run.
#[derive(Debug)]
pub struct Migrator {
    config: MigrateConfig,
    maker: PackageMaker,
    manifest: TreeManifest,
}

impl Migrator {
    pub fn new(config: MigrateConfig) -> MigrateResult<Self> {
        config.validate()?;
        let maker = PackageMaker::new(&config);
        Ok(Self {
            config,
            maker,
            manifest: TreeManifest::new(),
        })
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn manifest(&self) -> &TreeManifest {
        &self.manifest
    }

    /// Build the manifest for `scope`, persist it, and package every entry.
    pub fn export<S>(&mut self, source: &S, scope: &Scope) -> MigrateResult<ExportSummary>
    where
        S: HierarchySource + ContentSource + ?Sized,
    {
        self.build_manifest(source, scope)?;
        let manifest_path = self.config.manifest_path();
        self.manifest.save(&manifest_path)?;
        let packages = self.manifest_to_scratch(source)?;
        tracing::info!(%scope, entries = self.manifest.len(), "export complete");
        Ok(ExportSummary {
            manifest_path,
            entries: self.manifest.len(),
            packages,
        })
    }

    /// Replace the in-memory manifest with a fresh build of `scope`.
    pub fn build_manifest<S>(&mut self, source: &S, scope: &Scope) -> MigrateResult<&TreeManifest>
    where
        S: HierarchySource + ?Sized,
    {
        let mut builder = ManifestBuilder::new(source);
        match scope {
            Scope::All => builder.add_repository()?,
            Scope::Identifier(id) => builder.add_subtree(id)?,
        };
        self.manifest = builder.finish();
        Ok(&self.manifest)
    }

    /// Build one package per manifest entry, in manifest order.
    pub fn manifest_to_scratch<S>(&mut self, source: &S) -> MigrateResult<Vec<PathBuf>>
    where
        S: ContentSource + ?Sized,
    {
        self.ensure_manifest()?;
        let mut packages = Vec::with_capacity(self.manifest.len());
        for entry in &self.manifest {
            let bag = self.maker.make(source, entry.kind, &entry.id)?;
            packages.push(bag.root);
        }
        Ok(packages)
    }

    /// Upload every package in manifest order, addressing each to its
    /// parent as rebuilt by replay.
    pub async fn import_to<T>(&mut self, target: &T, base: &str) -> MigrateResult<ImportSummary>
    where
        T: UploadTarget + ?Sized,
    {
        self.ensure_manifest()?;
        if self.config.strict_manifest {
            self.manifest.validate()?;
        }

        let mut summary = ImportSummary::default();
        for step in self.manifest.replay() {
            let id = &step.entry.id;
            let package = self.maker.package_path(id)?;
            if !package.is_dir() {
                return Err(MigrateError::NotFound(format!("package for {id} at {}", package.display())));
            }
            let locator = target_locator(base, step.parent, step.entry.kind);
            let attempts = self.upload_with_retry(target, &package, &locator).await?;
            summary.deliveries.push(Delivery {
                id: id.clone(),
                package,
                locator,
                attempts,
            });
        }
        tracing::info!(
            uploaded = summary.deliveries.len(),
            retries = summary.retries(),
            "import complete"
        );
        Ok(summary)
    }

    async fn upload_with_retry<T>(&self, target: &T, package: &std::path::Path, locator: &str) -> MigrateResult<u32>
    where
        T: UploadTarget + ?Sized,
    {
        let max = self.config.max_upload_attempts;
        let mut attempt = 1;
        loop {
            match target.upload(package, locator).await {
                Ok(()) => {
                    tracing::debug!(%locator, attempt, "package uploaded");
                    return Ok(attempt);
                }
                Err(err) if attempt < max => {
                    tracing::warn!(%locator, attempt, error = %err, "upload failed; retrying");
                    tokio::time::sleep(self.config.retry_backoff()).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(MigrateError::Upload {
                        locator: locator.to_string(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    fn ensure_manifest(&mut self) -> MigrateResult<()> {
        if self.manifest.is_empty() {
            self.manifest = TreeManifest::load(&self.config.manifest_path())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::fixture;
    use crate::target::{DirectoryTarget, RecordingTarget};
    use sipbag_bag::BagVerifier;

    fn config(scratch: &std::path::Path) -> MigrateConfig {
        MigrateConfig {
            retry_backoff_ms: 1,
            ..MigrateConfig::with_scratch(scratch)
        }
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!(
            "1721.1/3".parse::<Scope>().unwrap(),
            Scope::Identifier("1721.1/3".into())
        );
        assert!("  ".parse::<Scope>().is_err());
    }

    #[test]
    fn export_all_writes_manifest_and_packages() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let summary = migrator.export(&fixture(), &Scope::All).unwrap();

        assert_eq!(summary.manifest_path, dir.path().join("export.map"));
        assert_eq!(
            std::fs::read_to_string(&summary.manifest_path).unwrap(),
            "0 4 1721.1/1\n1 4 1721.1/2\n2 3 1721.1/3\n3 2 1721.1/5\n3 2 1721.1/6\n\
             1 3 1721.1/4\n2 2 1721.1/7\n0 4 1721.1/9\n"
        );
        assert_eq!(summary.entries, 8);
        assert_eq!(summary.packages.len(), 8);
        for pkg in &summary.packages {
            assert!(BagVerifier::open(pkg).unwrap().verify().unwrap().is_valid());
        }
    }

    #[test]
    fn export_subtree_includes_ancestor_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let summary = migrator
            .export(&fixture(), &Scope::Identifier("1721.1/3".into()))
            .unwrap();
        let ids: Vec<_> = migrator.manifest().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1721.1/1", "1721.1/2", "1721.1/3", "1721.1/5", "1721.1/6"]);
        assert_eq!(summary.packages[0], dir.path().join("1721.1-1"));
    }

    #[test]
    fn export_of_item_scope_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let err = migrator
            .export(&fixture(), &Scope::Identifier("1721.1/5".into()))
            .unwrap_err();
        assert!(matches!(err, MigrateError::Manifest(_)));
    }

    #[tokio::test]
    async fn import_addresses_each_package_to_its_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        migrator.export(&fixture(), &Scope::All).unwrap();

        let target = RecordingTarget::new();
        let summary = migrator.import_to(&target, "http://mds/api/").await.unwrap();
        let locators: Vec<_> = target.uploads().into_iter().map(|(_, l)| l).collect();
        assert_eq!(
            locators,
            vec![
                "http://mds/api/package/COMMUNITY-sip",
                "http://mds/api/1721.1/1/package/COMMUNITY-sip",
                "http://mds/api/1721.1/2/package/COLLECTION-sip",
                "http://mds/api/1721.1/3/package/ITEM-sip",
                "http://mds/api/1721.1/3/package/ITEM-sip",
                "http://mds/api/1721.1/1/package/COLLECTION-sip",
                "http://mds/api/1721.1/4/package/ITEM-sip",
                "http://mds/api/package/COMMUNITY-sip",
            ]
        );
        assert_eq!(summary.deliveries[3].package, dir.path().join("1721.1-5"));
        assert_eq!(summary.retries(), 0);
    }

    #[tokio::test]
    async fn import_in_a_fresh_run_reloads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        Migrator::new(config(dir.path()))
            .unwrap()
            .export(&fixture(), &Scope::Identifier("1721.1/4".into()))
            .unwrap();

        let drop_dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(drop_dir.path()).unwrap();
        let mut fresh = Migrator::new(config(dir.path())).unwrap();
        let summary = fresh.import_to(&target, "http://mds").await.unwrap();

        assert_eq!(summary.deliveries.len(), 4);
        let log = std::fs::read_to_string(drop_dir.path().join(crate::target::UPLOAD_LOG)).unwrap();
        assert_eq!(
            log,
            "0001-1721.1-1 http://mds/package/COMMUNITY-sip\n\
             0002-1721.1-4 http://mds/1721.1/1/package/COLLECTION-sip\n\
             0003-1721.1-6 http://mds/1721.1/4/package/ITEM-sip\n\
             0004-1721.1-7 http://mds/1721.1/4/package/ITEM-sip\n"
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        migrator.export(&fixture(), &Scope::Identifier("1721.1/9".into())).unwrap();

        let target = RecordingTarget::failing(2);
        let summary = migrator.import_to(&target, "http://mds").await.unwrap();
        assert_eq!(summary.deliveries[0].attempts, 3);
        assert_eq!(summary.retries(), 2);
        assert_eq!(target.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_abort_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(MigrateConfig {
            max_upload_attempts: 2,
            ..config(dir.path())
        })
        .unwrap();
        migrator.export(&fixture(), &Scope::Identifier("1721.1/9".into())).unwrap();

        let target = RecordingTarget::failing(5);
        let err = migrator.import_to(&target, "http://mds").await.unwrap_err();
        assert!(matches!(err, MigrateError::Upload { attempts: 2, .. }));
        assert!(target.uploads().is_empty());
    }

    #[tokio::test]
    async fn malformed_manifest_is_rejected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("export.map"), "0 4 a\n2 3 b\n").unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let target = RecordingTarget::new();
        let err = migrator.import_to(&target, "http://mds").await.unwrap_err();
        assert!(matches!(err, MigrateError::Manifest(_)));
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("export.map"), "0 4 never-built\n").unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let err = migrator.import_to(&RecordingTarget::new(), "http://mds").await.unwrap_err();
        assert!(matches!(err, MigrateError::NotFound(_)));
    }

    #[tokio::test]
    async fn dot_identifier_in_loaded_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("export.map"), "0 4 ..\n").unwrap();
        let mut migrator = Migrator::new(config(&scratch)).unwrap();
        let target = RecordingTarget::new();
        let err = migrator.import_to(&target, "http://mds").await.unwrap_err();
        assert!(matches!(err, MigrateError::InvalidIdentifier(_)));
        assert_eq!(target.calls(), 0);
    }

    #[test]
    fn missing_manifest_without_export_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut migrator = Migrator::new(config(dir.path())).unwrap();
        let err = migrator.manifest_to_scratch(&fixture()).unwrap_err();
        assert!(matches!(err, MigrateError::Manifest(_)));
    }
}
