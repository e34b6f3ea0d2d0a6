/// Durable store pair: the vector index and its parallel metadata.
///
/// [`Store`] is the explicit handle the pipeline and the retriever share.
/// It loads both artifacts on open, persists them with temp-file + rename
/// so no reader ever sees a torn file, and flushes on close.
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};

pub mod metadata;
pub mod models;
pub mod vectors;

use metadata::MetadataStore;
use vectors::VectorIndex;

pub const INDEX_FILENAME: &str = "vectors.idx";
pub const METADATA_FILENAME: &str = "metadata.json";
pub const LOCK_FILENAME: &str = "ragdex.lock";

/// Locations of the two durable artifacts and the writer lock guarding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
    pub lock: PathBuf,
}

impl StorePaths {
    /// `dir/vectors.idx`, `dir/metadata.json` and `dir/ragdex.lock`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILENAME),
            metadata: dir.join(METADATA_FILENAME),
            lock: dir.join(LOCK_FILENAME),
        }
    }
}

/// A store shared between one writer (the indexer) and many readers.
///
/// The `RwLock` only orders tasks holding this handle. Other handles on the
/// same directory, in this process or another, are kept out by
/// [`ArtifactLock`].
pub type SharedStore = Arc<RwLock<Store>>;

/// Exclusive advisory lock on a store directory's lock file.
///
/// A writer holds it from [`Store::reload`] through [`Store::flush`], so
/// the id it reads as `size()` is still the last one on disk when it
/// writes. Released when dropped.
#[derive(Debug)]
pub struct ArtifactLock {
    _file: fs::File,
}

impl ArtifactLock {
    /// Block until the lock file at `path` is ours, creating it if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RagError::store(parent, e))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| RagError::store(path, e))?;
        file.lock().map_err(|e| RagError::store(path, e))?;
        debug!(path = %path.display(), "writer lock acquired");
        Ok(Self { _file: file })
    }
}

/// An opened vector index + metadata pair.
#[derive(Debug)]
pub struct Store {
    paths: StorePaths,
    index: VectorIndex,
    metadata: MetadataStore,
    dirty: bool,
}

impl Store {
    /// Load both artifacts. Missing files give empty stores.
    pub fn open(paths: StorePaths) -> Result<Self> {
        let index = VectorIndex::load(&paths.index)?;
        let metadata = MetadataStore::load(&paths.metadata)?;
        info!(
            index = %paths.index.display(),
            vectors = index.size(),
            entries = metadata.len(),
            "opened store"
        );

        let store = Self {
            paths,
            index,
            metadata,
            dirty: false,
        };
        if !store.alignment_check() {
            warn!(
                vectors = store.index.size(),
                entries = store.metadata.len(),
                "vector index and metadata are out of alignment; re-ingest affected documents"
            );
        }
        Ok(store)
    }

    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Whether both artifacts are present on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.paths.index.is_file() && self.paths.metadata.is_file()
    }

    /// True when every vector has exactly one metadata entry: equal sizes
    /// and metadata ids forming `0..len`. Diagnostic only, never repairs.
    #[must_use]
    pub fn alignment_check(&self) -> bool {
        let size = self.index.size();
        if size != self.metadata.len() as u64 {
            return false;
        }
        self.metadata
            .entries()
            .iter()
            .enumerate()
            .all(|(i, e)| e.ordinal_id == i as u64)
    }

    /// Take the writer lock for this store's directory on the blocking pool.
    pub async fn lock_artifacts(&self) -> Result<ArtifactLock> {
        let path = self.paths.lock.clone();
        tokio::task::spawn_blocking(move || ArtifactLock::acquire(&path))
            .await
            .map_err(|e| RagError::store(self.paths.lock.as_path(), std::io::Error::other(e)))?
    }

    /// Replace the in-memory pair with what is on disk now. Writers call
    /// this under [`ArtifactLock`] so they build on the latest ids.
    pub fn reload(&mut self) -> Result<()> {
        let index = VectorIndex::load(&self.paths.index)?;
        let metadata = MetadataStore::load(&self.paths.metadata)?;
        if index.size() != self.index.size() || metadata.len() != self.metadata.len() {
            debug!(
                vectors = index.size(),
                entries = metadata.len(),
                "store changed on disk since it was opened"
            );
        }
        self.index = index;
        self.metadata = metadata;
        self.dirty = false;
        Ok(())
    }

    /// Undo everything past `vectors` index entries and `entries` metadata
    /// entries, and forget that it was ever pending.
    pub(crate) fn discard_since(&mut self, vectors: u64, entries: usize) {
        self.index.truncate(vectors);
        self.metadata.truncate(entries);
        self.dirty = false;
    }

    pub(crate) fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Persist the index, then the metadata. The two writes are not atomic
    /// as a pair; a failure between them leaves `alignment_check` false.
    pub fn flush(&mut self) -> Result<()> {
        self.index.save(&self.paths.index)?;
        self.metadata.save(&self.paths.metadata)?;
        self.dirty = false;
        info!(
            vectors = self.index.size(),
            entries = self.metadata.len(),
            "store flushed"
        );
        Ok(())
    }

    /// Flush pending changes and release the handle.
    pub fn close(mut self) -> Result<()> {
        if self.dirty {
            self.flush()?;
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                warn!("failed to flush store on release: {e}");
            }
        }
    }
}

/// Read a whole artifact; `Ok(None)` when it does not exist.
pub(crate) fn read_artifact(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RagError::store(path, e)),
    }
}

/// Write `data` to a sibling temp file, fsync it and rename it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RagError::store(parent, e))?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        RagError::store(path, e)
    })
}
