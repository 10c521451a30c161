//! Directory-backed registry
//!
//! Each save goes to a fresh `v<N>` directory that is staged under a hidden
//! name and renamed into place whole. The `CURRENT` file names the live
//! version and is swapped by rename, so a reader sees either the old pair
//! or the new one, never a mix.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::{
    check_compatible, fingerprint, ArtifactManifest, ModelRegistry, MANIFEST_FILE, MODEL_FILE,
    PREPROCESSOR_FILE,
};
use crate::error::{Result, RiskError};
use crate::model::ModelWeights;
use crate::preprocessing::FeaturePreprocessor;

/// Pointer file holding the live version number
pub const CURRENT_FILE: &str = "CURRENT";

/// Version directories kept after a save, the live one included
const RETAINED_VERSIONS: u64 = 3;

const LOAD_ATTEMPTS: usize = 3;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stores artifacts as files under one directory
///
/// ```text
/// <root>/CURRENT                  live version number
/// <root>/v<N>/preprocessor.json   serde_json
/// <root>/v<N>/risk_model.bin      bincode
/// <root>/v<N>/manifest.json       version, timestamps, fingerprints
/// ```
///
/// Without `CURRENT`, the three files are read from `<root>` itself.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
}

impl FsModelRegistry {
    /// Registry rooted at `root`; the directory is created on first save
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Live version number, `None` before the first save
    pub fn current_version(&self) -> Result<Option<u64>> {
        let path = self.root.join(CURRENT_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| RiskError::ArtifactCorrupted {
                    path,
                    reason: format!("invalid version pointer {:?}: {}", raw.trim(), e),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn version_dir(&self, version: u64) -> PathBuf {
        self.root.join(format!("v{}", version))
    }

    /// Directory the live artifacts are read from
    pub fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.dir_for(self.current_version()?))
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.live_dir().join(PREPROCESSOR_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.live_dir().join(MODEL_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.live_dir().join(MANIFEST_FILE)
    }

    fn dir_for(&self, version: Option<u64>) -> PathBuf {
        match version {
            Some(v) => self.version_dir(v),
            None => self.root.clone(),
        }
    }

    fn live_dir(&self) -> PathBuf {
        self.current_dir().unwrap_or_else(|_| self.root.clone())
    }

    fn hidden_path(&self, kind: &str, version: u64) -> PathBuf {
        self.root.join(format!(
            ".{}-{}-{}-{}",
            kind,
            version,
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn read_required(path: &Path) -> Result<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RiskError::ArtifactMissing {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn verify(path: &Path, bytes: &[u8], expected: &str) -> Result<()> {
        let actual = fingerprint(bytes);
        if actual != expected {
            return Err(RiskError::ArtifactCorrupted {
                path: path.to_path_buf(),
                reason: format!("fingerprint {} does not match manifest {}", actual, expected),
            });
        }
        Ok(())
    }

    fn read_manifest(dir: &Path) -> Result<Option<ArtifactManifest>> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest = serde_json::from_slice(&bytes).map_err(|e| RiskError::ArtifactCorrupted {
            path,
            reason: e.to_string(),
        })?;
        Ok(Some(manifest))
    }

    fn load_from(dir: &Path) -> Result<(FeaturePreprocessor, ModelWeights)> {
        let preprocessor_path = dir.join(PREPROCESSOR_FILE);
        let model_path = dir.join(MODEL_FILE);

        let preprocessor_bytes = Self::read_required(&preprocessor_path)?;
        let model_bytes = Self::read_required(&model_path)?;

        // Artifacts written without a manifest are accepted unverified
        if let Some(manifest) = Self::read_manifest(dir)? {
            Self::verify(&preprocessor_path, &preprocessor_bytes, &manifest.preprocessor_fingerprint)?;
            Self::verify(&model_path, &model_bytes, &manifest.model_fingerprint)?;
        }

        let preprocessor = FeaturePreprocessor::from_json(&preprocessor_bytes).map_err(|e| {
            RiskError::ArtifactCorrupted {
                path: preprocessor_path.clone(),
                reason: e.to_string(),
            }
        })?;
        let weights: ModelWeights =
            bincode::deserialize(&model_bytes).map_err(|e| RiskError::ArtifactCorrupted {
                path: model_path.clone(),
                reason: e.to_string(),
            })?;

        check_compatible(&preprocessor, &weights)?;
        Ok((preprocessor, weights))
    }

    fn stage(
        staging: &Path,
        preprocessor_bytes: &[u8],
        model_bytes: &[u8],
        manifest: &ArtifactManifest,
    ) -> Result<()> {
        fs::create_dir(staging)?;
        fs::write(staging.join(PREPROCESSOR_FILE), preprocessor_bytes)?;
        fs::write(staging.join(MODEL_FILE), model_bytes)?;
        fs::write(staging.join(MANIFEST_FILE), serde_json::to_vec_pretty(manifest)?)?;
        Ok(())
    }

    fn publish(&self, version: u64) -> Result<()> {
        let tmp = self.hidden_path(CURRENT_FILE, version);
        fs::write(&tmp, format!("{}\n", version))?;
        if let Err(e) = fs::rename(&tmp, self.root.join(CURRENT_FILE)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn prune(&self, live: u64) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not list registry directory for pruning");
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let version = name
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(v) = version {
                if v + RETAINED_VERSIONS <= live {
                    if let Err(e) = fs::remove_dir_all(entry.path()) {
                        warn!(version = v, error = %e, "Could not remove old artifact version");
                    }
                }
            }
        }
    }
}

impl ModelRegistry for FsModelRegistry {
    fn save(&self, preprocessor: &FeaturePreprocessor, weights: &ModelWeights) -> Result<ArtifactManifest> {
        check_compatible(preprocessor, weights)?;
        fs::create_dir_all(&self.root)?;

        let previous = match self.current_version() {
            Ok(Some(v)) => v,
            Ok(None) => self.manifest().ok().flatten().map_or(0, |m| m.version),
            Err(e) => {
                warn!(error = %e, "Version pointer unreadable, restarting version count");
                0
            }
        };
        let version = previous + 1;

        let preprocessor_bytes = preprocessor.to_json()?;
        let model_bytes = bincode::serialize(weights)?;
        let manifest =
            ArtifactManifest::describe(version, preprocessor, weights, &preprocessor_bytes, &model_bytes);

        let staging = self.hidden_path("staging", version);
        let staged = Self::stage(&staging, &preprocessor_bytes, &model_bytes, &manifest)
            .and_then(|()| fs::rename(&staging, self.version_dir(version)).map_err(RiskError::from));
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        self.publish(version)?;
        self.prune(version);

        debug!(root = %self.root.display(), version, "Artifacts published");
        Ok(manifest)
    }

    fn load(&self) -> Result<(FeaturePreprocessor, ModelWeights)> {
        let mut attempt = 1;
        loop {
            let pointer = self.current_version()?;
            match Self::load_from(&self.dir_for(pointer)) {
                // A save moved the pointer and pruned what we were reading
                Err(e) if attempt < LOAD_ATTEMPTS && self.current_version().ok().flatten() != pointer => {
                    debug!(error = %e, attempt, "Artifacts replaced during load, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn manifest(&self) -> Result<Option<ArtifactManifest>> {
        Self::read_manifest(&self.current_dir()?)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
