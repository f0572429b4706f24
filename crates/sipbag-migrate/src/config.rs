use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sipbag_crypto::DigestAlgorithm;

use crate::error::{MigrateError, MigrateResult};

/// Settings for one export/import run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Directory receiving the manifest and one bag per entry.
    pub scratch_dir: PathBuf,
    /// Manifest file name inside `scratch_dir`.
    pub manifest_file: String,
    /// Digest used for every bag manifest.
    pub digest_algorithm: DigestAlgorithm,
    /// Item bundles left out of packages (derived content).
    pub excluded_bundles: Vec<String>,
    /// Drop metadata the target repository re-creates on ingest.
    pub migrate: bool,
    /// Fields dropped in migrate mode, as `schema.element[.qualifier]`.
    pub migration_skip_fields: Vec<String>,
    /// Validate manifest structure before replaying it.
    pub strict_manifest: bool,
    /// Attempts per package upload, including the first.
    pub max_upload_attempts: u32,
    /// Pause between upload attempts.
    pub retry_backoff_ms: u64,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("scratch"),
            manifest_file: "export.map".into(),
            digest_algorithm: DigestAlgorithm::Md5,
            excluded_bundles: vec!["TEXT".into()],
            migrate: false,
            migration_skip_fields: vec![
                "dc.identifier.uri".into(),
                "dc.date.accessioned".into(),
                "dc.date.available".into(),
                "dc.description.provenance".into(),
            ],
            strict_manifest: true,
            max_upload_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl MigrateConfig {
    /// Defaults with a given scratch directory.
    pub fn with_scratch(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            ..Default::default()
        }
    }

    /// Load a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> MigrateResult<()> {
        if self.max_upload_attempts == 0 {
            return Err(MigrateError::Config("max_upload_attempts must be at least 1".into()));
        }
        if self.manifest_file.trim().is_empty() || self.manifest_file.contains('/') {
            return Err(MigrateError::Config(format!(
                "manifest_file {:?} must be a plain file name",
                self.manifest_file
            )));
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.scratch_dir.join(&self.manifest_file)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Whether `field` is dropped from exported item metadata.
    pub fn skips_field(&self, field: &str) -> bool {
        self.migrate && self.migration_skip_fields.iter().any(|f| f == field)
    }

    pub fn excludes_bundle(&self, bundle: &str) -> bool {
        self.excluded_bundles.iter().any(|b| b == bundle)
    }
}
