//! Result cache for VM listings
//!
//! The store only holds documents; whether to read, run the tool, or write
//! is decided by [`CachePolicy`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::PLUGIN_NAME;
use crate::error::InventoryError;

/// Key→document store
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a document; `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>, InventoryError>;

    /// Store a document under `key`, replacing any previous one
    async fn set(&self, key: &str, value: &Value) -> Result<(), InventoryError>;
}

/// Cache key for an inventory source path
#[must_use]
pub fn cache_key(source: &Path) -> String {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{PLUGIN_NAME}_{hex}")
}

/// What to do about the cache for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Caching is enabled for the source
    pub use_cache: bool,
    /// The caller trusts existing entries (false after `--refresh-cache`)
    pub cache_valid: bool,
}

impl CachePolicy {
    /// Whether an existing entry may be returned instead of running the tool
    #[must_use]
    pub fn may_read(&self) -> bool {
        self.use_cache && self.cache_valid
    }

    /// Whether a freshly fetched result is written back
    #[must_use]
    pub fn should_write(&self) -> bool {
        self.use_cache
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, InventoryError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), InventoryError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// On-disk envelope for a cached document
#[derive(Debug, Serialize, Deserialize)]
struct CachedResult {
    /// When cached
    cached_at: DateTime<Utc>,
    /// Tool output
    data: Value,
}

impl CachedResult {
    /// Check if cache entry is expired
    fn is_expired(&self, timeout: Option<Duration>) -> bool {
        let Some(timeout) = timeout else {
            return false;
        };
        let age = Utc::now().signed_duration_since(self.cached_at);
        age.to_std().is_ok_and(|age| age > timeout)
    }
}

/// One JSON file per key in a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    timeout: Option<Duration>,
}

impl FileCache {
    /// Create a store rooted at `dir`; entries older than `timeout` are absent
    pub fn new(dir: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, InventoryError> {
        let path = self.path_for(key);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(InventoryError::CacheError(format!("{}: {e}", path.display()))),
        };

        let cached: CachedResult = match serde_json::from_str(&content) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                return Ok(None);
            }
        };

        if cached.is_expired(self.timeout) {
            debug!(key, cached_at = %cached.cached_at, "cache entry expired");
            return Ok(None);
        }

        debug!(key, "cache hit");
        Ok(Some(cached.data))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), InventoryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| InventoryError::CacheError(format!("{}: {e}", self.dir.display())))?;

        let cached = CachedResult {
            cached_at: Utc::now(),
            data: value.clone(),
        };
        let content = serde_json::to_string(&cached)
            .map_err(|e| InventoryError::CacheError(e.to_string()))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| InventoryError::CacheError(format!("{}: {e}", path.display())))?;

        debug!(key, path = %path.display(), "cache entry written");
        Ok(())
    }
}
