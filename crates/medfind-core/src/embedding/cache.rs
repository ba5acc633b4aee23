//! Persistent embedding cache.
//!
//! Maps a medicine name to its embedding vector. The whole map is stored as
//! one JSON object (`{"name": [f32, ...]}`), read once at open and rewritten
//! after every insertion.
//!
//! # Cache-miss policy
//!
//! Vectors are computed lazily: [`EmbeddingCache::get_or_compute`] calls the
//! provider only for a name that is not cached yet, and only once at a time
//! per name. A failed call caches nothing, so the name is simply retried on
//! its next miss. The provider call and the write that follows run in their
//! own task, so a caller that gives up early doesn't waste the call;
//! [`EmbeddingCache::close`] waits for those tasks before the final flush.
//!
//! Readers work on an `Arc` snapshot of the map. Serializing the file happens
//! on the blocking pool against such a snapshot, so a write in progress never
//! holds the map lock.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::provider::{EmbeddingProvider, ProviderError, DEFAULT_PROVIDER_TIMEOUT};

/// Cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache file is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Cache write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type CacheResult<T> = Result<T, CacheError>;

type VectorMap = HashMap<String, Vec<f32>>;

/// Durable name → vector cache with lazy population.
///
/// Cloning is cheap; clones share the same map and file.
#[derive(Clone)]
pub struct EmbeddingCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    vectors: RwLock<Arc<VectorMap>>,
    /// One gate per name currently being computed.
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Provider calls and their writes, drained by `close`.
    tasks: Mutex<JoinSet<()>>,
    /// Serializes file writes.
    writer: tokio::sync::Mutex<()>,
}

impl EmbeddingCache {
    /// Open the cache at `path`. A missing file starts an empty cache; so does
    /// an unreadable or corrupt one, after logging.
    pub fn open<P: AsRef<Path>>(path: P, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let path = path.as_ref().to_path_buf();
        let vectors = match load_file(&path) {
            Ok(Some(vectors)) => {
                info!(
                    path = %path.display(),
                    entries = vectors.len(),
                    "Loaded embedding cache"
                );
                vectors
            }
            Ok(None) => {
                debug!(path = %path.display(), "No embedding cache file; starting empty");
                VectorMap::new()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Embedding cache unreadable; starting empty"
                );
                VectorMap::new()
            }
        };

        Self {
            inner: Arc::new(CacheInner {
                path,
                provider,
                timeout: DEFAULT_PROVIDER_TIMEOUT,
                vectors: RwLock::new(Arc::new(vectors)),
                inflight: Mutex::new(HashMap::new()),
                tasks: Mutex::new(JoinSet::new()),
                writer: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Set the per-call provider timeout. Only valid before the cache is shared.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.timeout = timeout;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                warn!("Embedding cache already shared; timeout unchanged");
                Self { inner }
            }
        }
    }

    /// Cached vector for `name`, if any. Never calls the provider.
    pub fn get(&self, name: &str) -> Option<Vec<f32>> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.vectors.read().contains_key(name)
    }

    /// Cached vector for `name`, computing and persisting it on a miss.
    ///
    /// Returns `None` when the provider fails; the caller should skip
    /// semantic ranking for this term.
    pub async fn get_or_compute(&self, name: &str) -> Option<Vec<f32>> {
        if let Some(vector) = self.get(name) {
            return Some(vector);
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let key = name.to_string();
        {
            let mut tasks = self.inner.tasks.lock();
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    warn!(error = %e, "Embedding task failed");
                }
            }
            tasks.spawn(async move {
                // The caller may have given up; the vector is cached either way.
                let _ = tx.send(inner.compute(key).await);
            });
        }

        match rx.await {
            Ok(vector) => vector,
            Err(_) => {
                warn!(name, "Embedding task ended without a result");
                None
            }
        }
    }

    /// Insert a vector computed elsewhere and persist the cache.
    ///
    /// Entries are never replaced: returns `Ok(false)` if `name` is already
    /// cached.
    pub async fn insert(&self, name: &str, vector: Vec<f32>) -> CacheResult<bool> {
        if !self.inner.try_insert(name, vector)? {
            return Ok(false);
        }
        self.inner.persist().await?;
        Ok(true)
    }

    /// Run `f` over the cached vectors without copying them.
    pub fn with_vectors<R>(&self, f: impl FnOnce(&HashMap<String, Vec<f32>>) -> R) -> R {
        let vectors = self.inner.snapshot();
        f(&vectors)
    }

    /// Dimensionality shared by every cached vector.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    pub fn len(&self) -> usize {
        self.inner.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.vectors.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Wait for pending provider calls and their writes, then flush the
    /// cache once more.
    pub async fn close(self) -> CacheResult<()> {
        loop {
            let mut pending = std::mem::take(&mut *self.inner.tasks.lock());
            if pending.is_empty() {
                break;
            }
            debug!(tasks = pending.len(), "Waiting for embedding tasks");
            while let Some(finished) = pending.join_next().await {
                if let Err(e) = finished {
                    warn!(error = %e, "Embedding task failed");
                }
            }
        }

        if self.is_empty() && !self.inner.path.exists() {
            return Ok(());
        }
        self.inner.persist().await
    }
}

impl CacheInner {
    fn get(&self, name: &str) -> Option<Vec<f32>> {
        self.vectors.read().get(name).cloned()
    }

    fn snapshot(&self) -> Arc<VectorMap> {
        Arc::clone(&self.vectors.read())
    }

    fn dimension(&self) -> Option<usize> {
        self.vectors.read().values().next().map(Vec::len)
    }

    /// Insert unless present. Rejects vectors that don't match the cache's
    /// dimensionality.
    fn try_insert(&self, name: &str, vector: Vec<f32>) -> CacheResult<bool> {
        if vector.is_empty() || vector.iter().any(|v| !v.is_finite()) {
            return Err(CacheError::InvalidVector(format!(
                "refusing to cache invalid vector for {}",
                name
            )));
        }

        // Readers keep going until the swap; only one inserter at a time.
        let vectors = self.vectors.upgradable_read();
        if vectors.contains_key(name) {
            return Ok(false);
        }
        if let Some(dim) = vectors.values().next().map(Vec::len) {
            if dim != vector.len() {
                return Err(CacheError::InvalidVector(format!(
                    "vector for {} has dimension {}, cache holds {}",
                    name,
                    vector.len(),
                    dim
                )));
            }
        }

        // A persist holding the old snapshot forces a copy; make it here,
        // outside the write lock.
        let copy = (Arc::strong_count(&*vectors) > 1).then(|| VectorMap::clone(&**vectors));
        let mut vectors = RwLockUpgradableReadGuard::upgrade(vectors);
        match copy {
            Some(mut map) => {
                map.insert(name.to_string(), vector);
                *vectors = Arc::new(map);
            }
            None => {
                Arc::make_mut(&mut *vectors).insert(name.to_string(), vector);
            }
        }
        Ok(true)
    }

    fn gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.inflight
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release_gate(&self, name: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self.inflight.lock();
        // Drop our handle under the lock so the last releaser sees only the map's.
        drop(gate);
        if inflight.get(name).is_some_and(|g| Arc::strong_count(g) == 1) {
            inflight.remove(name);
        }
    }

    async fn compute(&self, name: String) -> Option<Vec<f32>> {
        let gate = self.gate(&name);
        let result = {
            let _turn = gate.lock().await;
            match self.get(&name) {
                // Filled in while we waited for the gate.
                Some(vector) => Some(vector),
                None => self.fetch_and_store(&name).await,
            }
        };
        self.release_gate(&name, gate);
        result
    }

    async fn fetch_and_store(&self, name: &str) -> Option<Vec<f32>> {
        let fetched = match tokio::time::timeout(self.timeout, self.provider.embed(name)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        let vector = match fetched {
            Ok(vector) => vector,
            Err(e) => {
                warn!(
                    name,
                    model = self.provider.model(),
                    error = %e,
                    "Skipping embedding"
                );
                return None;
            }
        };

        match self.try_insert(name, vector.clone()) {
            Ok(_) => {}
            Err(e) => {
                warn!(name, error = %e, "Discarding embedding");
                return None;
            }
        }

        if let Err(e) = self.persist().await {
            // The entry stays in memory; the next successful write includes it.
            warn!(path = %self.path.display(), error = %e, "Failed to persist embedding cache");
        }
        debug!(name, dimension = vector.len(), "Cached embedding");
        Some(vector)
    }

    /// Rewrite the cache file from a snapshot taken under the writer lock,
    /// so the last write always includes every completed insertion.
    async fn persist(&self) -> CacheResult<()> {
        let _writer = self.writer.lock().await;
        let snapshot = self.snapshot();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_file(&path, &snapshot)).await?
    }
}

/// Write the map as one JSON object with sorted keys, via a temp file.
fn write_file(path: &Path, vectors: &VectorMap) -> CacheResult<()> {
    let sorted: BTreeMap<&String, &Vec<f32>> = vectors.iter().collect();
    let bytes = serde_json::to_vec(&sorted)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read the cache file. `Ok(None)` means there is no file.
fn load_file(path: &Path) -> CacheResult<Option<VectorMap>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let raw: HashMap<String, Vec<f32>> =
        serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt(e.to_string()))?;

    // Keep the dominant dimensionality; anything else can't be compared.
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for v in raw.values().filter(|v| !v.is_empty()) {
        *counts.entry(v.len()).or_default() += 1;
    }
    let Some(dim) = counts
        .into_iter()
        .max_by_key(|&(dim, count)| (count, dim))
        .map(|(dim, _)| dim)
    else {
        return Ok(Some(VectorMap::new()));
    };

    let total = raw.len();
    let vectors: VectorMap = raw
        .into_iter()
        .filter(|(_, v)| v.len() == dim && v.iter().all(|x| x.is_finite()))
        .collect();
    if vectors.len() < total {
        warn!(
            dropped = total - vectors.len(),
            dimension = dim,
            "Dropped cache entries with inconsistent vectors"
        );
    }
    Ok(Some(vectors))
}
