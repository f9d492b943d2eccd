//! File-backed document store
//!
//! Documents are JSON blobs at `{root}/{key}.json`. Writes go to a temp file
//! in the destination directory and are atomically renamed into place, so a
//! crash mid-write never leaves a partial document visible to
//! [`EntityStore::exists`] or [`EntityStore::read`]. Temp files start with a
//! dot and are ignored by [`EntityStore::list_keys`].

pub mod key;

pub use key::{MatchLocation, StoreKey, DETAILS_DIR, MATCHES_DIR, SEASONS_DIR};

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::metrics;
use crate::DetailCategory;

/// Directory holding unparseable payloads
pub const DIAGNOSTICS_DIR: &str = "diagnostics";

const DOCUMENT_EXT: &str = "json";

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Document on disk is not valid JSON
    #[error("corrupt document {key}: {message}")]
    Corrupt {
        /// Offending key
        key: String,
        /// Parser message
        message: String,
    },
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Hierarchical key/value store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct EntityStore {
    root: PathBuf,
}

impl EntityStore {
    /// Open a store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a key's document.
    pub fn document_path(&self, key: &StoreKey) -> PathBuf {
        self.root
            .join(format!("{}.{DOCUMENT_EXT}", key.as_path()))
    }

    /// Whether a document is stored under `key`.
    pub fn exists(&self, key: &StoreKey) -> bool {
        self.document_path(key).is_file()
    }

    /// Read the document under `key`, or `None` if absent.
    pub fn read(&self, key: &StoreKey) -> StoreResult<Option<Value>> {
        let path = self.document_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::IoError(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.as_path(),
                message: e.to_string(),
            })
    }

    /// Atomically write `payload` under `key`, replacing any previous document.
    pub fn write(&self, key: &StoreKey, payload: &Value) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let path = self.document_path(key);
        write_atomic(&path, &bytes)?;
        metrics::record_store_write();
        debug!(key = %key, bytes = bytes.len(), "Stored document");
        Ok(())
    }

    /// Keep an unparseable payload for later inspection. Returns the file written.
    pub fn preserve_raw(&self, key: &StoreKey, raw: &str) -> StoreResult<PathBuf> {
        let path = self
            .root
            .join(DIAGNOSTICS_DIR)
            .join(format!("{}.raw", key.as_path()));
        write_atomic(&path, raw.as_bytes())?;
        warn!(key = %key, path = %path.display(), "Preserved unparseable payload");
        Ok(path)
    }

    /// Sorted keys of all documents at or below `prefix` (`""` for everything).
    pub fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(prefix)
        };

        let mut keys = Vec::new();
        if start.is_dir() {
            collect_keys(&start, prefix, &mut keys)?;
        } else if start.with_extension(DOCUMENT_EXT).is_file() {
            keys.push(prefix.to_string());
        }
        keys.sort();
        Ok(keys)
    }

    /// All stored match locations, optionally restricted to one league, in
    /// numeric (league, season, match) order.
    pub fn match_locations(&self, league_id: Option<u64>) -> StoreResult<Vec<MatchLocation>> {
        let prefix = match league_id {
            Some(id) => format!("{DETAILS_DIR}/{id}"),
            None => DETAILS_DIR.to_string(),
        };
        let mut locations: Vec<MatchLocation> = self
            .list_keys(&prefix)?
            .iter()
            .filter_map(|k| match StoreKey::parse(k) {
                Some(StoreKey::Detail { location, .. }) => Some(location),
                _ => None,
            })
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }

    /// League ids that have at least one stored match document.
    pub fn league_ids(&self) -> StoreResult<Vec<u64>> {
        let mut ids: Vec<u64> = self
            .match_locations(None)?
            .into_iter()
            .map(|loc| loc.league_id)
            .collect();
        ids.dedup();
        Ok(ids)
    }

    /// Find where a match's documents are stored.
    pub fn locate_match(&self, match_id: u64) -> StoreResult<Option<MatchLocation>> {
        Ok(self
            .match_locations(None)?
            .into_iter()
            .find(|loc| loc.match_id == match_id))
    }

    /// Every stored category document of one match.
    pub fn read_match(
        &self,
        location: &MatchLocation,
    ) -> StoreResult<BTreeMap<DetailCategory, Value>> {
        let mut documents = BTreeMap::new();
        for category in DetailCategory::ALL {
            if let Some(doc) = self.read(&location.key(category))? {
                documents.insert(category, doc);
            }
        }
        Ok(documents)
    }
}

fn collect_keys(dir: &Path, prefix: &str, keys: &mut Vec<String>) -> StoreResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| StoreError::IoError(format!("failed to list {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::IoError(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let child = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };

        let path = entry.path();
        if path.is_dir() {
            collect_keys(&path, &child, keys)?;
        } else if let Some(stem) = child.strip_suffix(&format!(".{DOCUMENT_EXT}")) {
            keys.push(stem.to_string());
        }
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| StoreError::IoError(format!("failed to create {}: {e}", parent.display())))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| StoreError::IoError(format!("failed to create temp file: {e}")))?;
    temp.write_all(bytes)
        .map_err(|e| StoreError::IoError(format!("failed to write temp file: {e}")))?;
    temp.flush()
        .map_err(|e| StoreError::IoError(format!("failed to flush temp file: {e}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::IoError(format!("failed to sync temp file: {e}")))?;
    temp.persist(path)
        .map_err(|e| StoreError::IoError(format!("failed to persist {}: {e}", path.display())))?;

    // Make the rename itself durable.
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}
