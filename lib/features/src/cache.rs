//! Content-addressed cache for embedding vectors.
//!
//! Keys are SHA-256 of `model_tag|content`, so changing the embedding model
//! never serves a stale vector. Image keys hash the encoded bytes first. The
//! scoring engine never talks to the cache; only embedders wrapped in
//! [`CachedTextEmbedder`] or [`CachedImageEmbedder`] do.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::builder::{ImageEmbedder, TextEmbedder};
use crate::error::{FeatureError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn derive(model_tag: &str, content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model_tag.as_bytes());
        hasher.update(b"|");
        hasher.update(content.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Key for an encoded image: the model tag plus the SHA-256 of its bytes.
    pub fn for_image(model_tag: &str, image: &[u8]) -> Self {
        Self::derive(model_tag, &format!("image:{:x}", Sha256::digest(image)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait ContentCache: Send + Sync {
    fn get(&self, key: &ContentKey) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &ContentKey, bytes: &[u8]) -> Result<()>;
}

/// In-memory cache.
#[derive(Debug, Default)]
pub struct MemoryContentCache {
    entries: RwLock<AHashMap<ContentKey, Vec<u8>>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ContentCache for MemoryContentCache {
    fn get(&self, key: &ContentKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &ContentKey, bytes: &[u8]) -> Result<()> {
        self.entries.write().insert(key.clone(), bytes.to_vec());
        Ok(())
    }
}

/// On-disk cache laid out as `<dir>/<first two hex chars>/<key>.bin`.
/// Entries are written atomically, so readers never see a torn file.
#[derive(Debug, Clone)]
pub struct FsContentCache {
    dir: PathBuf,
}

impl FsContentCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &ContentKey) -> PathBuf {
        let k = key.as_str();
        self.dir.join(&k[..2.min(k.len())]).join(format!("{}.bin", k))
    }
}

impl ContentCache for FsContentCache {
    fn get(&self, key: &ContentKey) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &ContentKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(bytes))
            .map_err(|e| FeatureError::Cache(format!("{}: {}", path.display(), e)))
    }
}

/// Cached vector for `key`, if present and of the expected length. Read
/// failures and bad entries are logged and reported as a miss.
fn lookup<C: ContentCache>(cache: &C, key: &ContentKey, dim: usize) -> Option<Vec<f32>> {
    match cache.get(key) {
        Ok(Some(bytes)) => match bincode::deserialize::<Vec<f32>>(&bytes) {
            Ok(v) if v.len() == dim => return Some(v),
            Ok(v) => warn!(key = key.as_str(), len = v.len(), "cached vector has wrong length"),
            Err(e) => warn!(key = key.as_str(), error = %e, "unreadable cache entry"),
        },
        Ok(None) => debug!(key = key.as_str(), "cache miss"),
        Err(e) => warn!(key = key.as_str(), error = %e, "cache read failed"),
    }
    None
}

fn store<C: ContentCache>(cache: &C, key: &ContentKey, vector: &[f32]) -> Result<()> {
    if let Err(e) = cache.put(key, &bincode::serialize(vector)?) {
        warn!(key = key.as_str(), error = %e, "cache write failed");
    }
    Ok(())
}

/// Wraps a text embedder with a content-addressed cache.
///
/// Cache failures are logged and fall through to the embedder; a broken
/// cache never changes the produced vector.
pub struct CachedTextEmbedder<E, C> {
    inner: E,
    cache: C,
}

impl<E: TextEmbedder, C: ContentCache> CachedTextEmbedder<E, C> {
    pub fn new(inner: E, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<E: TextEmbedder, C: ContentCache> TextEmbedder for CachedTextEmbedder<E, C> {
    fn model_tag(&self) -> &str {
        self.inner.model_tag()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = ContentKey::derive(self.inner.model_tag(), text);
        if let Some(v) = lookup(&self.cache, &key, self.inner.dim()) {
            return Ok(v);
        }
        let vector = self.inner.embed(text)?;
        store(&self.cache, &key, &vector)?;
        Ok(vector)
    }
}

/// Image counterpart of [`CachedTextEmbedder`]. Images that fail to embed
/// are never cached.
pub struct CachedImageEmbedder<E, C> {
    inner: E,
    cache: C,
}

impl<E: ImageEmbedder, C: ContentCache> CachedImageEmbedder<E, C> {
    pub fn new(inner: E, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<E: ImageEmbedder, C: ContentCache> ImageEmbedder for CachedImageEmbedder<E, C> {
    fn model_tag(&self) -> &str {
        self.inner.model_tag()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        let key = ContentKey::for_image(self.inner.model_tag(), image);
        if let Some(v) = lookup(&self.cache, &key, self.inner.dim()) {
            return Ok(v);
        }
        let vector = self.inner.embed(image)?;
        store(&self.cache, &key, &vector)?;
        Ok(vector)
    }
}
