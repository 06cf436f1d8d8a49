//! Execution result storage
//!
//! Keeps results and created resource ids in memory, optionally persisted
//! to a JSON file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dispatcher::ExecutionRecord;
use crate::error::Result;

/// Current file format version
const STORE_VERSION: u32 = 1;

/// In-memory representation of stored data
#[derive(Debug, Default)]
struct StoreCache {
    results: IndexMap<String, ExecutionRecord>,
    created_ids: IndexMap<String, Value>,
    /// Whether the cache has been modified since last save
    dirty: bool,
}

/// File format for persistent storage
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    version: u32,
    #[serde(default)]
    results: IndexMap<String, ExecutionRecord>,
    #[serde(default)]
    created_ids: IndexMap<String, Value>,
}

/// Store for execution results, keyed by endpoint (`METHOD /path`)
#[derive(Clone)]
pub struct ResultStore {
    /// Backing file, if persisted
    path: Option<PathBuf>,
    cache: Arc<RwLock<StoreCache>>,
}

impl ResultStore {
    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: Arc::new(RwLock::new(StoreCache::default())),
        }
    }

    /// A store persisted to the given file
    pub fn with_file(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            cache: Arc::new(RwLock::new(StoreCache::default())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load stored data from disk, replacing the in-memory state
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if !path.exists() {
            debug!("No existing results file found");
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let file: StoreFile = serde_json::from_str(&contents)?;

        let mut cache = self.cache.write().await;
        cache.results = file.results;
        cache.created_ids = file.created_ids;
        cache.dirty = false;

        debug!("Loaded {} results from {:?}", cache.results.len(), path);
        Ok(())
    }

    /// Save stored data to disk if anything changed
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut cache = self.cache.write().await;
        if !cache.dirty {
            return Ok(());
        }

        let file = StoreFile {
            version: STORE_VERSION,
            results: cache.results.clone(),
            created_ids: cache.created_ids.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;

        cache.dirty = false;
        debug!("Saved {} results to {:?}", cache.results.len(), path);
        Ok(())
    }

    /// Store the result of an execution
    pub async fn save_result(&self, record: ExecutionRecord) {
        let mut cache = self.cache.write().await;
        cache.results.insert(record.api.clone(), record);
        cache.dirty = true;
    }

    /// Result for an endpoint
    pub async fn get_result(&self, api: &str) -> Option<ExecutionRecord> {
        self.cache.read().await.results.get(api).cloned()
    }

    /// All results in execution order
    pub async fn results(&self) -> Vec<ExecutionRecord> {
        self.cache.read().await.results.values().cloned().collect()
    }

    /// Record the id of a resource created by an endpoint
    pub async fn save_created_id(&self, api: &str, id: Value) {
        let mut cache = self.cache.write().await;
        // Re-insert so the latest id sorts last
        cache.created_ids.shift_remove(api);
        cache.created_ids.insert(api.to_string(), id);
        cache.dirty = true;
    }

    pub async fn get_created_id(&self, api: &str) -> Option<Value> {
        self.cache.read().await.created_ids.get(api).cloned()
    }

    /// Snapshot of all created ids, oldest first
    pub async fn created_ids(&self) -> IndexMap<String, Value> {
        self.cache.read().await.created_ids.clone()
    }

    /// Clear all stored results and ids
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.results.clear();
        cache.created_ids.clear();
        cache.dirty = true;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.results.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.results.is_empty()
    }
}
