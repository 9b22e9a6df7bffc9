//! Content-addressed cache of compiled test units.
//!
//! Entries are keyed by the SHA-256 of the *question-bound* test source (the
//! template after the placeholder has been replaced with the candidate's
//! class name) together with the question id. Only the test half of a
//! submission is cached; candidate sources change on every call.
//!
//! The store is an in-memory LRU guarded by a `Mutex`. Concurrent misses on
//! the same key are not serialised: both callers compile, and the first
//! write wins.

use std::{
    fs,
    num::NonZeroUsize,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    java::{CompileFailure, CompiledArtifact, Diagnostic},
    types::QuestionId,
};

/// Version tag written into snapshots.
const SNAPSHOT_VERSION: u32 = 1;

/// Lowercase hex SHA-256 of `bound_source`.
pub fn source_hash(bound_source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bound_source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// hex digest of the question-bound test source
    pub hash:     String,
    /// question the template belongs to
    pub question: QuestionId,
}

impl CacheKey {
    /// Key for a question-bound test source.
    pub fn for_source(bound_source: &str, question: QuestionId) -> Self {
        Self {
            hash: source_hash(bound_source),
            question,
        }
    }
}

/// What a miss produced.
#[derive(Debug, Clone)]
pub enum MissOutcome {
    /// The test unit compiled; only its own artifact is stored.
    Compiled(CompiledArtifact),
    /// The test unit did not compile.
    Failed(CompileFailure),
}

/// One compiled (or failed) test-source variant of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// hex digest of the question-bound test source
    pub hash:            String,
    /// question identity
    pub question:        QuestionId,
    /// name of the test unit
    pub test_unit:       String,
    /// compiled test unit; `None` when compilation failed
    pub artifact:        Option<CompiledArtifact>,
    /// whether the test unit compiled
    pub success:         bool,
    /// structured diagnostics of a failed compilation
    pub diagnostics:     Vec<Diagnostic>,
    /// raw compiler output of a failed compilation
    pub diagnostic_text: String,
    /// when the entry was first recorded
    pub created:         DateTime<Utc>,
    /// refreshed on every hit
    pub last_used:       DateTime<Utc>,
}

impl CacheEntry {
    /// Key of this entry.
    pub fn key(&self) -> CacheKey {
        CacheKey {
            hash:     self.hash.clone(),
            question: self.question,
        }
    }
}

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    /// layout version
    version: u32,
    /// entries, least recently used first
    entries: Vec<CacheEntry>,
}

/// Bounded, thread-safe store of [`CacheEntry`] rows; the only writer of
/// them.
pub struct CompilationCache {
    /// entries in recency order
    inner:    Mutex<LruCache<CacheKey, CacheEntry>>,
    /// maximum number of entries
    capacity: usize,
}

impl std::fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationCache")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl CompilationCache {
    /// Creates an empty cache; a capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            capacity,
        }
    }

    /// Locks the store, recovering from a poisoned lock.
    fn store(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry for `(hash, question)` without refreshing it.
    pub fn lookup(&self, hash: &str, question: QuestionId) -> Option<CacheEntry> {
        let key = CacheKey {
            hash: hash.to_string(),
            question,
        };
        self.store().peek(&key).cloned()
    }

    /// Refreshes the last-used time and recency of `entry`; returns the
    /// updated row, or `None` if it was evicted in the meantime.
    pub fn touch(&self, entry: &CacheEntry) -> Option<CacheEntry> {
        let mut store = self.store();
        let row = store.get_mut(&entry.key())?;
        row.last_used = Utc::now();
        Some(row.clone())
    }

    /// Records the outcome of a miss and returns the stored entry.
    ///
    /// If another caller already recorded the same key, that entry is kept
    /// and returned unchanged.
    pub fn record_miss(&self, key: CacheKey, test_unit: &str, outcome: MissOutcome) -> CacheEntry {
        let mut store = self.store();
        if let Some(existing) = store.get(&key) {
            debug!(hash = %key.hash, question = %key.question, "concurrent miss already recorded");
            return existing.clone();
        }

        let now = Utc::now();
        let (artifact, success, diagnostics, diagnostic_text) = match outcome {
            MissOutcome::Compiled(artifact) => (Some(artifact), true, Vec::new(), String::new()),
            MissOutcome::Failed(failure) => {
                let diagnostics = failure.diagnostics_for(test_unit);
                (None, false, diagnostics, failure.raw_output)
            }
        };
        let entry = CacheEntry {
            hash: key.hash.clone(),
            question: key.question,
            test_unit: test_unit.to_string(),
            artifact,
            success,
            diagnostics,
            diagnostic_text,
            created: now,
            last_used: now,
        };
        store.put(key, entry.clone());
        entry
    }

    /// Drops every entry not used since `cutoff`; returns how many went.
    pub fn evict_unused_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut store = self.store();
        let stale: Vec<CacheKey> = store
            .iter()
            .filter(|(_, entry)| entry.last_used < cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            store.pop(key);
        }
        stale.len()
    }

    /// Snapshot of all entries, most recently used first.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.store().iter().map(|(_, entry)| entry.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.store().len()
    }

    /// True when the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.store().clear();
    }

    /// Writes all entries to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries();
        entries.reverse();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        let json = serde_json::to_string(&snapshot).context("Could not serialize cache")?;
        fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))
    }

    /// Reads a snapshot written by [`CompilationCache::save`]. A missing
    /// file yields an empty cache.
    pub fn load(path: &Path, capacity: usize) -> Result<Self> {
        let cache = Self::new(capacity);
        if !path.exists() {
            return Ok(cache);
        }
        let text =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&text)
            .with_context(|| format!("Could not parse cache snapshot {}", path.display()))?;
        anyhow::ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            "Unsupported cache snapshot version {}",
            snapshot.version
        );
        {
            let mut store = cache.store();
            for entry in snapshot.entries {
                store.put(entry.key(), entry);
            }
        }
        Ok(cache)
    }
}
