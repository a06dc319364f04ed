//! Versioned artifact store.
//!
//! Layout under the root directory:
//!
//! ```text
//! CURRENT                          name of the active version
//! versions/<version>/bundle.bin.gz bincode bundle, gzip-compressed
//! versions/<version>/manifest.json checksum, format version, config summary
//! ```
//!
//! A version directory is staged under a temporary name and renamed into
//! place once complete; `CURRENT` is replaced atomically afterwards. Files,
//! the staging directory and `versions/` are fsynced before `CURRENT` moves,
//! so a crash at any point leaves the previously active version loadable.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ati_core::ArtifactBundle;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::manifest::{BundleManifest, ConfigSummary};

const CURRENT_FILE: &str = "CURRENT";
const VERSIONS_DIR: &str = "versions";
const BUNDLE_FILE: &str = "bundle.bin.gz";
const MANIFEST_FILE: &str = "manifest.json";
const STAGING_MARKER: &str = ".tmp-";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no bundle has been published yet")]
    NothingPublished,

    #[error("version '{0}' does not exist")]
    UnknownVersion(String),

    #[error("version '{0}' already exists")]
    VersionExists(String),

    #[error("invalid version name '{0}'")]
    InvalidVersionName(String),

    #[error("checksum mismatch for version '{version}': manifest {expected}, file {actual}")]
    ChecksumMismatch {
        version: String,
        expected: String,
        actual: String,
    },
}

pub struct ArtifactStore {
    root: PathBuf,
    publish_lock: Mutex<()>,
}

impl ArtifactStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(VERSIONS_DIR))
            .with_context(|| format!("creating artifact store at {}", root.display()))?;
        Ok(Self {
            root,
            publish_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(version)
    }

    fn generate_version_name() -> String {
        let now: DateTime<Utc> = Utc::now();
        let id = Uuid::new_v4().simple().to_string();
        format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &id[..8])
    }

    /// Publish under a generated version name and make it current.
    pub fn publish(&self, bundle: &ArtifactBundle) -> Result<BundleManifest> {
        self.publish_as(&Self::generate_version_name(), bundle)
    }

    /// Publish under `version` and make it current. Versions are immutable:
    /// publishing an existing name fails.
    pub fn publish_as(&self, version: &str, bundle: &ArtifactBundle) -> Result<BundleManifest> {
        validate_version_name(version)?;
        bundle.validate()?;
        let _guard = self.publish_lock.lock();

        let final_dir = self.version_dir(version);
        if final_dir.exists() {
            return Err(StoreError::VersionExists(version.to_string()).into());
        }

        let encoded = bincode::serialize(bundle).context("serializing bundle")?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded)?;
        let compressed = encoder.finish()?;

        let manifest = BundleManifest {
            version: version.to_string(),
            bundle_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339(),
            sha256: format!("{:x}", Sha256::digest(&compressed)),
            size: compressed.len() as u64,
            format_version: bundle.format_version(),
            config: ConfigSummary::of(bundle),
        };

        let staging = self
            .root
            .join(VERSIONS_DIR)
            .join(format!("{}{}{}", version, STAGING_MARKER, Uuid::new_v4().simple()));
        fs::create_dir_all(&staging)?;
        let staged = write_synced(&staging.join(BUNDLE_FILE), &compressed)
            .and_then(|_| write_synced(&staging.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?))
            .and_then(|_| sync_dir(&staging))
            .and_then(|_| commit_dir(&staging, &final_dir));
        if let Err(e) = staged {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "failed to remove staging dir");
            }
            return Err(e.context(format!("publishing version '{}'", version)));
        }

        self.write_current(version)?;
        info!(
            version,
            sha256 = %manifest.sha256,
            size = manifest.size,
            "artifact bundle published"
        );
        Ok(manifest)
    }

    /// Point `CURRENT` at an already published version.
    pub fn activate(&self, version: &str) -> Result<()> {
        validate_version_name(version)?;
        let _guard = self.publish_lock.lock();
        if !self.version_dir(version).join(MANIFEST_FILE).exists() {
            return Err(StoreError::UnknownVersion(version.to_string()).into());
        }
        self.write_current(version)?;
        info!(version, "artifact version activated");
        Ok(())
    }

    fn write_current(&self, version: &str) -> Result<()> {
        AtomicFile::new(self.root.join(CURRENT_FILE), OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(version.as_bytes()))
            .map_err(|e| anyhow::anyhow!("updating {}: {}", CURRENT_FILE, e))
    }

    pub fn current_version(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(s) => {
                let v = s.trim().to_string();
                Ok(if v.is_empty() { None } else { Some(v) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_current(&self) -> Result<ArtifactBundle> {
        let version = self.current_version()?.ok_or(StoreError::NothingPublished)?;
        self.load_version(&version)
    }

    /// Load and verify one version: checksum, format version, then
    /// [`ArtifactBundle::validate`].
    pub fn load_version(&self, version: &str) -> Result<ArtifactBundle> {
        validate_version_name(version)?;
        let manifest = self.read_manifest(version)?;

        if manifest.format_version != ArtifactBundle::FORMAT_VERSION {
            return Err(ati_core::Error::mismatch(
                "bundle format version",
                ArtifactBundle::FORMAT_VERSION,
                manifest.format_version,
            )
            .into());
        }

        let compressed = fs::read(self.version_dir(version).join(BUNDLE_FILE))
            .with_context(|| format!("reading bundle of version '{}'", version))?;
        let actual = format!("{:x}", Sha256::digest(&compressed));
        if actual != manifest.sha256 {
            return Err(StoreError::ChecksumMismatch {
                version: version.to_string(),
                expected: manifest.sha256,
                actual,
            }
            .into());
        }

        let mut encoded = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut encoded)?;
        let bundle: ArtifactBundle =
            bincode::deserialize(&encoded).context("deserializing bundle")?;
        bundle.validate()?;

        info!(version, sha256 = %manifest.sha256, "artifact bundle loaded");
        Ok(bundle)
    }

    pub fn read_manifest(&self, version: &str) -> Result<BundleManifest> {
        let path = self.version_dir(version).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(StoreError::UnknownVersion(version.to_string()).into());
        }
        let data = fs::read(&path)?;
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Published versions, newest first. Staging leftovers are ignored.
    pub fn list_versions(&self) -> Result<Vec<BundleManifest>> {
        let mut manifests = Vec::new();
        for entry in fs::read_dir(self.root.join(VERSIONS_DIR))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(STAGING_MARKER) || !entry.path().join(MANIFEST_FILE).exists() {
                continue;
            }
            match self.read_manifest(&name) {
                Ok(m) => manifests.push(m),
                Err(e) => warn!(version = %name, error = %e, "skipping unreadable manifest"),
            }
        }
        manifests.sort_by(|a, b| {
            let ta = DateTime::parse_from_rfc3339(&a.created_at).ok();
            let tb = DateTime::parse_from_rfc3339(&b.created_at).ok();
            tb.cmp(&ta).then_with(|| b.version.cmp(&a.version))
        });
        Ok(manifests)
    }
}

fn validate_version_name(version: &str) -> Result<()> {
    let ok = !version.is_empty()
        && !version.contains(STAGING_MARKER)
        && version != "."
        && version != ".."
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(StoreError::InvalidVersionName(version.to_string()).into());
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Flush a directory's entries to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("syncing directory {}", dir.display()))
}

#[cfg(not(unix))]
fn sync_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("syncing directory {}: not a directory", dir.display());
    }
    Ok(())
}

/// Rename a staged directory into place and make the rename durable.
fn commit_dir(staging: &Path, final_dir: &Path) -> Result<()> {
    fs::rename(staging, final_dir)?;
    match final_dir.parent() {
        Some(parent) => sync_dir(parent),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ati_core::{
        Anchors, AtiConfig, CompositeWeights, MetadataScaler, ModalityModel, ModalityWeights,
        NoveltyBounds, PerModality,
    };
    use tempfile::TempDir;

    fn bundle(seed: u64) -> ArtifactBundle {
        let model = || ModalityModel {
            anchors: Anchors::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap(),
            bounds: NoveltyBounds { min: 0.1, max: 0.6 },
            weights: ModalityWeights {
                novelty: 0.25,
                diversity: 0.75,
            },
        };
        let config = AtiConfig::builder().k(2).dims(2, 2, 2).seed(seed).build().unwrap();
        let scaler = MetadataScaler {
            mean: vec![1.0, 2.0],
            scale: vec![0.5, 1.0],
            balance: 0.8,
        };
        ArtifactBundle::new(
            config,
            PerModality::new(model(), model(), model()),
            CompositeWeights::EQUAL,
            scaler,
        )
        .unwrap()
    }

    #[test]
    fn test_publish_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        assert!(store.current_version().unwrap().is_none());

        let manifest = store.publish_as("v1", &bundle(1)).unwrap();
        assert_eq!(manifest.format_version, ArtifactBundle::FORMAT_VERSION);
        assert_eq!(manifest.sha256.len(), 64);
        assert_eq!(store.current_version().unwrap().as_deref(), Some("v1"));
        assert_eq!(store.load_current().unwrap(), bundle(1));
    }

    #[test]
    fn test_versions_are_immutable_and_listed_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        store.publish_as("v1", &bundle(1)).unwrap();
        store.publish_as("v2", &bundle(2)).unwrap();
        assert!(store.publish_as("v1", &bundle(3)).is_err());

        let versions: Vec<String> = store.list_versions().unwrap().into_iter().map(|m| m.version).collect();
        assert_eq!(versions, vec!["v2".to_string(), "v1".to_string()]);

        store.activate("v1").unwrap();
        assert_eq!(store.load_current().unwrap().config().seed, 1);
        assert_eq!(store.load_version("v2").unwrap().config().seed, 2);
        assert!(store.activate("missing").is_err());
    }

    #[test]
    fn test_corrupted_bundle_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        store.publish_as("v1", &bundle(1)).unwrap();

        let path = tmp.path().join(VERSIONS_DIR).join("v1").join(BUNDLE_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = store.load_current().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_format_version_drift_is_version_mismatch() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        store.publish_as("v1", &bundle(1)).unwrap();

        let path = tmp.path().join(VERSIONS_DIR).join("v1").join(MANIFEST_FILE);
        let mut manifest: BundleManifest = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        manifest.format_version += 1;
        fs::write(&path, serde_json::to_vec(&manifest).unwrap()).unwrap();

        let err = store.load_current().unwrap_err();
        let core = err.downcast_ref::<ati_core::Error>().unwrap();
        assert!(core.is_version_mismatch());
    }

    #[test]
    fn test_nothing_published_and_bad_names() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.load_current().unwrap_err().downcast_ref::<StoreError>(),
            Some(StoreError::NothingPublished)
        ));
        assert!(store.publish_as("../escape", &bundle(1)).is_err());
        assert!(store.publish_as("", &bundle(1)).is_err());
    }

    #[test]
    fn test_generated_names_are_unique() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        let a = store.publish(&bundle(1)).unwrap();
        let b = store.publish(&bundle(1)).unwrap();
        assert_ne!(a.version, b.version);
        assert_eq!(store.current_version().unwrap(), Some(b.version));
    }

    #[test]
    fn test_commit_leaves_no_staging_and_current_names_existing_dir() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        store.publish_as("v1", &bundle(1)).unwrap();

        let entries: Vec<String> = fs::read_dir(tmp.path().join(VERSIONS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["v1".to_string()]);
        let current = store.current_version().unwrap().unwrap();
        assert!(store.version_dir(&current).join(BUNDLE_FILE).is_file());
        assert!(store.version_dir(&current).join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn test_commit_dir_moves_and_syncs() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("v1.tmp-x");
        fs::create_dir_all(&staging).unwrap();
        write_synced(&staging.join(BUNDLE_FILE), b"bundle").unwrap();
        sync_dir(&staging).unwrap();

        let final_dir = tmp.path().join("v1");
        commit_dir(&staging, &final_dir).unwrap();
        assert!(!staging.exists());
        assert_eq!(fs::read(final_dir.join(BUNDLE_FILE)).unwrap(), b"bundle");

        assert!(sync_dir(&tmp.path().join("missing")).is_err());
        assert!(commit_dir(&staging, &tmp.path().join("v2")).is_err());
    }
}
