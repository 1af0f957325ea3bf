//! On-disk audio cache: byte/file accounting, size/age eviction, and the
//! persisted retention map protecting auto-playlist downloads.


use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;

const LOG_TARGET: &str = "melobot::cache";

/// Filename of the persisted retention map inside the cache directory.
const RETENTION_MAP_FILE: &str = "autoplay_cachemap.json";

/// Error types for cache operations.
#[derive(Debug)]
pub enum CacheError {
    Io(io::Error),
    Serialize(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "I/O error: {}", e),
            CacheError::Serialize(s) => write!(f, "Serialization error: {}", s),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        CacheError::Io(err)
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionSummary {
    pub removed_files: u64,
    pub removed_bytes: u64,
    pub retained_files: u64,
}

struct CachedFile {
    path: PathBuf,
    size: u64,
    accessed: SystemTime,
    age: Duration,
}

/// Tracks disk usage of downloaded media and applies the eviction policy.
/// Counters are only ever mutated by the cache's own methods.
pub struct AudioFileCache {
    path: PathBuf,
    limit_bytes: u64,
    limit_days: u64,
    retention_enabled: bool,
    size_bytes: u64,
    file_count: u64,
    map: HashMap<String, String>,
    save_lock: TokioMutex<()>,
}

impl AudioFileCache {
    pub fn new(settings: &Settings) -> Self {
        let mut cache = AudioFileCache {
            path: settings.cache_dir.clone(),
            limit_bytes: settings.cache_limit_bytes,
            limit_days: settings.cache_limit_days,
            retention_enabled: settings.retention_active(),
            size_bytes: 0,
            file_count: 0,
            map: HashMap::new(),
            save_lock: TokioMutex::new(()),
        };
        if cache.retention_enabled {
            cache.load_map();
        }
        cache
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn cache_dir(&self) -> &Path {
        &self.path
    }

    fn map_path(&self) -> PathBuf {
        self.path.join(RETENTION_MAP_FILE)
    }

    /// Extension-independent key for a cached file: the decode backend may
    /// pick the output container, so only the stem is stable.
    fn stem_of(path: &Path) -> Option<String> {
        path.file_stem().map(|s| s.to_string_lossy().into_owned())
    }

    // --- Retention map ---

    /// Loads the persisted retention map. A malformed file is treated as
    /// an empty map, never as a fatal error.
    fn load_map(&mut self) {
        let map_path = self.map_path();
        if !map_path.exists() {
            return;
        }
        match fs::read_to_string(&map_path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => {
                    info!(target: LOG_TARGET, "Loaded retention map with {} entries.", map.len());
                    self.map = map;
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Retention map is malformed, starting empty: {}", e);
                    self.map = HashMap::new();
                }
            },
            Err(e) => {
                warn!(target: LOG_TARGET, "Could not read retention map, starting empty: {}", e);
            }
        }
    }

    /// Rewrites the persisted retention map wholesale. Saves are serialized
    /// under one lock since they are triggered from multiple call sites.
    pub async fn save_map(&self) -> Result<(), CacheError> {
        let _guard = self.save_lock.lock().await;
        let content = serde_json::to_string_pretty(&self.map)
            .map_err(|e| CacheError::Serialize(e.to_string()))?;
        fs::create_dir_all(&self.path)?;
        fs::write(self.map_path(), content)?;
        debug!(target: LOG_TARGET, "Saved retention map ({} entries).", self.map.len());
        Ok(())
    }

    /// Records an auto-playlist download so eviction will skip it. No-op
    /// unless retention is enabled.
    pub async fn remember_autoplay_file(
        &mut self,
        filename: &Path,
        url: &str,
    ) -> Result<(), CacheError> {
        if !self.retention_enabled {
            return Ok(());
        }
        let stem = match Self::stem_of(filename) {
            Some(stem) => stem,
            None => return Ok(()),
        };
        self.map.insert(stem, url.to_string());
        self.save_map().await
    }

    /// Drops the retention entry for `filename`, if any.
    pub async fn forget_autoplay_file(&mut self, filename: &Path) -> Result<(), CacheError> {
        if let Some(stem) = Self::stem_of(filename) {
            if self.map.remove(&stem).is_some() {
                return self.save_map().await;
            }
        }
        Ok(())
    }

    /// Whether a cached file is pinned: mapped to a URL that is still in
    /// the current auto-playlist.
    pub fn is_retained(&self, filename: &Path, autoplaylist: &[String]) -> bool {
        if !self.retention_enabled {
            return false;
        }
        match Self::stem_of(filename).and_then(|stem| self.map.get(&stem)) {
            Some(url) => autoplaylist.iter().any(|u| u == url),
            None => false,
        }
    }

    pub fn retention_map(&self) -> &HashMap<String, String> {
        &self.map
    }

    // --- Accounting ---

    fn walk_files(&self) -> Result<Vec<CachedFile>, CacheError> {
        let mut files = Vec::new();
        if !self.path.is_dir() {
            return Ok(files);
        }
        let now = SystemTime::now();
        for dirent in fs::read_dir(&self.path)? {
            let dirent = dirent?;
            let path = dirent.path();
            if !path.is_file() || path.file_name().map(|n| n == RETENTION_MAP_FILE).unwrap_or(false)
            {
                continue;
            }
            let meta = dirent.metadata()?;
            // Access time is unreliable on some mounts; fall back to the
            // creation time.
            let accessed = meta
                .accessed()
                .or_else(|_| meta.created())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let age = now.duration_since(created).unwrap_or_default();
            files.push(CachedFile {
                path,
                size: meta.len(),
                accessed,
                age,
            });
        }
        Ok(files)
    }

    /// Re-walks the cache directory and refreshes the byte/file counters.
    #[instrument(skip(self))]
    pub fn scan(&mut self) -> Result<(), CacheError> {
        let files = self.walk_files()?;
        self.file_count = files.len() as u64;
        self.size_bytes = files.iter().map(|f| f.size).sum();
        info!(
            target: LOG_TARGET,
            "Cache scan: {} files, {} bytes.", self.file_count, self.size_bytes
        );
        Ok(())
    }

    /// Accounts for a freshly downloaded file and runs eviction when the
    /// byte limit is exceeded.
    pub async fn handle_new_file(
        &mut self,
        path: &Path,
        autoplaylist: &[String],
    ) -> Result<Option<EvictionSummary>, CacheError> {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.size_bytes += size;
        self.file_count += 1;
        if self.limit_bytes > 0 && self.size_bytes > self.limit_bytes {
            debug!(
                target: LOG_TARGET,
                "Cache over byte limit after new file ({} > {}), evicting.",
                self.size_bytes,
                self.limit_bytes
            );
            return Ok(Some(self.evict(autoplaylist).await?));
        }
        Ok(None)
    }

    // --- Eviction ---

    /// Applies the size/age eviction policy. Files are visited most
    /// recently accessed first; retained files are skipped outright; once
    /// the running total has exceeded the byte limit every later file is
    /// removed. The size limit wins over the age limit when both apply.
    #[instrument(skip(self, autoplaylist))]
    pub async fn evict(&mut self, autoplaylist: &[String]) -> Result<EvictionSummary, CacheError> {
        if self.limit_bytes == 0 && self.limit_days == 0 {
            info!(target: LOG_TARGET, "No cache limits configured, eviction is a no-op.");
            return Ok(EvictionSummary::default());
        }

        let mut files = self.walk_files()?;
        files.sort_by(|a, b| b.accessed.cmp(&a.accessed));

        let mut summary = EvictionSummary::default();
        let mut cumulative: u64 = 0;
        let mut map_dirty = false;

        for file in &files {
            if let Some(stem) = Self::stem_of(&file.path) {
                if let Some(url) = self.map.get(&stem).cloned() {
                    if autoplaylist.iter().any(|u| u == &url) {
                        summary.retained_files += 1;
                        continue;
                    }
                    // The mapped URL left the auto-playlist; prune the
                    // stale entry while we are walking anyway.
                    self.map.remove(&stem);
                    map_dirty = true;
                }
            }

            let over_size = self.limit_bytes > 0 && cumulative > self.limit_bytes;
            let over_age =
                self.limit_days > 0 && file.age > Duration::from_secs(self.limit_days * 86_400);
            if over_size || over_age {
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        summary.removed_files += 1;
                        summary.removed_bytes += file.size;
                        debug!(
                            target: LOG_TARGET,
                            "Evicted {} ({} bytes, over_size={}, over_age={}).",
                            file.path.display(),
                            file.size,
                            over_size,
                            over_age
                        );
                    }
                    Err(e) => {
                        warn!(target: LOG_TARGET, "Failed to evict {}: {}", file.path.display(), e);
                        cumulative += file.size;
                    }
                }
            } else {
                cumulative += file.size;
            }
        }

        if map_dirty {
            self.save_map().await?;
        }
        self.scan()?;
        info!(
            target: LOG_TARGET,
            "Eviction removed {} files ({} bytes), retained {}.",
            summary.removed_files,
            summary.removed_bytes,
            summary.retained_files
        );
        Ok(summary)
    }

    /// Best-effort removal of the whole cache directory: direct removal,
    /// then rename-and-remove, then give up with a diagnostic. Returns
    /// whether the directory is gone.
    #[instrument(skip(self))]
    pub fn delete_cache_dir(&self) -> bool {
        if !self.path.exists() {
            return true;
        }
        if fs::remove_dir_all(&self.path).is_ok() {
            return true;
        }
        let renamed = self.path.with_extension("old");
        if fs::rename(&self.path, &renamed).is_ok() && fs::remove_dir_all(&renamed).is_ok() {
            return true;
        }
        warn!(
            target: LOG_TARGET,
            "Could not remove cache directory {}, leaving it in place.",
            self.path.display()
        );
        false
    }
}
