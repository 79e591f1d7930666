use crate::entry::{unix_ms_now, CacheEntry};
use crate::error::{CacheError, Result};
use fs2::FileExt;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

const LOCK_FILE: &str = ".lock";
const DEFAULT_MEMORY_CAPACITY: usize = 4096;

#[derive(Clone, Debug, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Memory,
}

impl CacheBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBackend::File => "file",
            CacheBackend::Memory => "memory",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "disk" => Ok(CacheBackend::File),
            "memory" | "mem" => Ok(CacheBackend::Memory),
            other => Err(format!("cache backend must be file or memory (got `{other}`)")),
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub backend: CacheBackend,
    /// Zero means entries never expire
    pub ttl: Duration,
    /// Entry bound of the memory backend
    pub capacity: usize,
}

impl CacheConfig {
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            backend: CacheBackend::File,
            ttl: Duration::ZERO,
            capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }

    pub fn memory() -> Self {
        Self {
            dir: PathBuf::new(),
            backend: CacheBackend::Memory,
            ttl: Duration::ZERO,
            capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn ttl_ms(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Entry count and on-disk size of a cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub entries: usize,
    pub bytes: u64,
    pub enabled: bool,
}

/// Held for the lifetime of a file-backed cache; released on drop.
struct DirLock {
    file: std::fs::File,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn acquire_dir_lock(dir: &Path) -> Result<DirLock> {
    std::fs::create_dir_all(dir).map_err(|err| CacheError::io(dir, err))?;
    let path = dir.join(LOCK_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| CacheError::io(&path, err))?;
    file.try_lock_exclusive()
        .map_err(|_| CacheError::Locked(dir.to_path_buf()))?;
    Ok(DirLock { file })
}

enum Backend {
    Disabled(String),
    File { dir: PathBuf, _lock: DirLock },
    Memory(Mutex<LruCache<String, CacheEntry>>),
}

enum StoredEntry {
    Live(CacheEntry),
    Missing,
    /// Expired, corrupt or stored under another key.
    Stale,
}

async fn evict(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to evict stale cache entry {}: {err}", path.display());
        }
    }
}

/// Handle to the summary cache, shared by dispatcher workers.
///
/// Reads never fail: a missing, corrupt, expired or unreadable entry is a
/// miss. Writes are idempotent and never replace a live entry.
pub struct SummaryCache {
    backend: Backend,
    ttl_ms: u64,
}

impl fmt::Debug for SummaryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match &self.backend {
            Backend::Disabled(reason) => format!("disabled ({reason})"),
            Backend::File { dir, .. } => format!("file ({})", dir.display()),
            Backend::Memory(_) => "memory".to_string(),
        };
        f.debug_struct("SummaryCache")
            .field("backend", &backend)
            .field("ttl_ms", &self.ttl_ms)
            .finish()
    }
}

impl SummaryCache {
    /// Open the configured cache, surfacing any failure.
    pub fn try_open(config: &CacheConfig) -> Result<Self> {
        let backend = match config.backend {
            CacheBackend::File => Backend::File {
                _lock: acquire_dir_lock(&config.dir)?,
                dir: config.dir.clone(),
            },
            CacheBackend::Memory => {
                let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
                Backend::Memory(Mutex::new(LruCache::new(capacity)))
            }
        };
        Ok(Self {
            backend,
            ttl_ms: config.ttl_ms(),
        })
    }

    /// Open the configured cache; on failure the cache is disabled for this run.
    pub fn open(config: &CacheConfig) -> Self {
        match Self::try_open(config) {
            Ok(cache) => {
                log::debug!("Opened {cache:?}");
                cache
            }
            Err(err) => {
                log::warn!("Summary cache unavailable, continuing without it: {err}");
                Self::disabled(err.to_string())
            }
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Disabled(reason.into()),
            ttl_ms: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, Backend::Disabled(_))
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Disabled(_) => "disabled",
            Backend::File { .. } => CacheBackend::File.as_str(),
            Backend::Memory(_) => CacheBackend::Memory.as_str(),
        }
    }

    /// `<dir>/<fp[0..2]>/<fp>.json`
    pub fn entry_path(dir: &Path, fingerprint: &str) -> PathBuf {
        let shard = fingerprint.get(0..2).unwrap_or("00");
        dir.join(shard).join(format!("{fingerprint}.json"))
    }

    pub async fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        let now = unix_ms_now();
        match &self.backend {
            Backend::Disabled(_) => None,
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap_or_else(|poison| poison.into_inner());
                let expired = entries.get(fingerprint)?.is_expired(self.ttl_ms, now);
                if expired {
                    entries.pop(fingerprint);
                    return None;
                }
                entries.get(fingerprint).cloned()
            }
            Backend::File { dir, .. } => {
                let path = Self::entry_path(dir, fingerprint);
                match self.read_entry(&path, fingerprint, now).await {
                    StoredEntry::Live(entry) => Some(entry),
                    StoredEntry::Missing => None,
                    StoredEntry::Stale => {
                        evict(&path).await;
                        None
                    }
                }
            }
        }
    }

    async fn read_entry(&self, path: &Path, fingerprint: &str, now: u64) -> StoredEntry {
        let Ok(bytes) = tokio::fs::read(path).await else {
            return StoredEntry::Missing;
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Summary cache entry corrupted {}: {err}", path.display());
                return StoredEntry::Stale;
            }
        };
        if entry.fingerprint != fingerprint {
            log::warn!("Summary cache entry {} has a foreign key", path.display());
            return StoredEntry::Stale;
        }
        if entry.is_expired(self.ttl_ms, now) {
            log::debug!("Summary cache entry {} expired", path.display());
            return StoredEntry::Stale;
        }
        StoredEntry::Live(entry)
    }

    /// Store an entry. Returns `Ok(false)` when a live entry already holds the
    /// fingerprint; expired or corrupt entries are replaced.
    pub async fn put(&self, entry: &CacheEntry) -> Result<bool> {
        match &self.backend {
            Backend::Disabled(reason) => Err(CacheError::Disabled(reason.clone())),
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap_or_else(|poison| poison.into_inner());
                let live = entries
                    .peek(&entry.fingerprint)
                    .is_some_and(|existing| !existing.is_expired(self.ttl_ms, unix_ms_now()));
                if live {
                    return Ok(false);
                }
                entries.put(entry.fingerprint.clone(), entry.clone());
                Ok(true)
            }
            Backend::File { dir, .. } => {
                let path = Self::entry_path(dir, &entry.fingerprint);
                let existing = self
                    .read_entry(&path, &entry.fingerprint, unix_ms_now())
                    .await;
                if matches!(existing, StoredEntry::Live(_)) {
                    return Ok(false);
                }
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|err| CacheError::io(parent, err))?;
                }
                let bytes = serde_json::to_vec_pretty(entry)?;
                let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
                tokio::fs::write(&tmp, &bytes)
                    .await
                    .map_err(|err| CacheError::io(&tmp, err))?;
                if let Err(err) = tokio::fs::rename(&tmp, &path).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(CacheError::io(&path, err));
                }
                Ok(true)
            }
        }
    }

    /// Remove every entry; returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        match &self.backend {
            Backend::Disabled(reason) => Err(CacheError::Disabled(reason.clone())),
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap_or_else(|poison| poison.into_inner());
                let removed = entries.len();
                entries.clear();
                Ok(removed)
            }
            Backend::File { dir, .. } => {
                let mut removed = 0usize;
                for file in entry_files(dir) {
                    std::fs::remove_file(&file).map_err(|err| CacheError::io(&file, err))?;
                    if is_entry_file(&file) {
                        removed += 1;
                    }
                }
                remove_empty_shards(dir);
                log::info!("Removed {removed} cached summaries from {}", dir.display());
                Ok(removed)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        match &self.backend {
            Backend::Disabled(_) => CacheStats {
                backend: self.backend_name().to_string(),
                ..Default::default()
            },
            Backend::Memory(entries) => {
                let entries = entries.lock().unwrap_or_else(|poison| poison.into_inner());
                CacheStats {
                    backend: self.backend_name().to_string(),
                    dir: None,
                    entries: entries.len(),
                    bytes: entries
                        .iter()
                        .map(|(_, entry)| entry.summary.len() as u64)
                        .sum(),
                    enabled: true,
                }
            }
            Backend::File { dir, .. } => {
                let mut stats = CacheStats {
                    backend: self.backend_name().to_string(),
                    dir: Some(dir.clone()),
                    enabled: true,
                    ..Default::default()
                };
                for file in entry_files(dir).into_iter().filter(|f| is_entry_file(f)) {
                    stats.entries += 1;
                    stats.bytes += std::fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
                }
                stats
            }
        }
    }

    /// Release the cache at the end of a run.
    pub fn close(self) {
        if self.is_enabled() {
            let stats = self.stats();
            log::debug!(
                "Closing {} summary cache ({} entries)",
                stats.backend,
                stats.entries
            );
        }
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Entry files and leftover temp files under the cache directory.
fn entry_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "json" || ext == "tmp")
        })
        .collect()
}

fn remove_empty_shards(dir: &Path) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            // Fails when the shard still holds foreign files.
            let _ = std::fs::remove_dir(&path);
        }
    }
}
