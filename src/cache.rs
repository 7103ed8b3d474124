//! Cache storage module
//!
//! This module provides persistent caching functionality using either the
//! system's standard cache directory or an explicitly chosen directory.
//! Data is serialized to JSON together with the time it was stored, so
//! entries can expire.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to determine cache directory location
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,

    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to read cached data
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write cached data
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to remove cached data
    #[error("Failed to remove cache file {path}: {source}")]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Failed to deserialize cached data
    #[error("Failed to deserialize cache file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for caching
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// On-disk layout of a cached value
#[derive(Deserialize)]
struct CacheEntry<T> {
    /// Seconds since the unix epoch at which the value was stored
    stored_at: u64,
    data: T,
}

#[derive(Serialize)]
struct CacheEntryRef<'a, T> {
    stored_at: u64,
    data: &'a T,
}

/// A generic cache storage for serializable data
///
/// Values are stored as one JSON file per identifier. When a time-to-live
/// is configured, entries older than it are treated as missing.
#[derive(Debug)]
pub struct CacheStorage<T> {
    /// The directory where cached data is stored
    cache_dir: PathBuf,
    /// Maximum age of an entry, `None` for entries that never expire
    ttl: Option<Duration>,
    _phantom: PhantomData<T>,
}

impl<T> CacheStorage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Opens or creates a cache storage with the given name
    ///
    /// The cache will be stored in the system's standard cache directory
    /// under a subdirectory named after the application and the provided name.
    /// The name will be sanitized (lowercased, non-alphanumeric characters
    /// replaced with underscores).
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cache: CacheStorage<Vec<EpisodeRecord>> =
    ///     CacheStorage::open("episodes", Some(Duration::from_secs(24 * 60 * 60)))?;
    /// ```
    pub fn open(name: &str, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let proj_dirs = directories::ProjectDirs::from("", "fastily", "tv_rename")
            .ok_or(CacheError::CacheDirectoryNotFound)?;

        Self::open_in(proj_dirs.cache_dir().join(sanitize_name(name)), ttl)
    }

    /// Opens or creates a cache storage rooted at `cache_dir`
    pub fn open_in(cache_dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|e| CacheError::DirectoryCreationFailed {
            path: cache_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            cache_dir,
            ttl,
            _phantom: PhantomData,
        })
    }

    /// Loads cached data for the given identifier
    ///
    /// # Returns
    ///
    /// The cached data if it exists and has not expired, or None otherwise.
    /// Returns an error if the data exists but cannot be read or deserialized.
    pub fn load(&self, identifier: &str) -> Result<Option<T>, CacheError> {
        let file_path = self.entry_path(identifier);

        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path).map_err(|e| CacheError::ReadFailed {
            path: file_path.clone(),
            source: e,
        })?;

        let entry: CacheEntry<T> =
            serde_json::from_str(&content).map_err(|e| CacheError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        if let Some(ttl) = self.ttl {
            let age = now_secs().saturating_sub(entry.stored_at);
            if age > ttl.as_secs() {
                return Ok(None);
            }
        }

        Ok(Some(entry.data))
    }

    /// Stores data in the cache with the given identifier
    pub fn store(&self, identifier: &str, data: &T) -> Result<(), CacheError> {
        let file_path = self.entry_path(identifier);

        let content = serde_json::to_string_pretty(&CacheEntryRef {
            stored_at: now_secs(),
            data,
        })?;

        fs::write(&file_path, content).map_err(|e| CacheError::WriteFailed {
            path: file_path,
            source: e,
        })?;

        Ok(())
    }

    /// Removes the entry for the given identifier, if any
    pub fn remove(&self, identifier: &str) -> Result<(), CacheError> {
        let file_path = self.entry_path(identifier);

        match fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::RemoveFailed {
                path: file_path,
                source: e,
            }),
        }
    }

    /// Returns the path to the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", sanitize_name(identifier)))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Sanitizes a name for use in file paths
///
/// Converts to lowercase and replaces all characters that are not
/// a-z, 0-9, or hyphen with underscores.
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Simple"), "simple");
        assert_eq!(sanitize_name("series_81189_dvd"), "series_81189_dvd");
        assert_eq!(sanitize_name("With-Hyphens"), "with-hyphens");
        assert_eq!(sanitize_name("alice.smith"), "alice_smith");
    }

    #[test]
    fn test_store_load_remove() {
        let temp = TempDir::new().unwrap();
        let cache: CacheStorage<Vec<u32>> = CacheStorage::open_in(temp.path(), None).unwrap();

        assert_eq!(cache.load("numbers").unwrap(), None);
        cache.store("numbers", &vec![1, 2, 3]).unwrap();
        assert_eq!(cache.load("numbers").unwrap(), Some(vec![1, 2, 3]));

        cache.remove("numbers").unwrap();
        assert_eq!(cache.load("numbers").unwrap(), None);
        cache.remove("numbers").unwrap();
    }

    #[test]
    fn test_expired_entries_are_missing() {
        let temp = TempDir::new().unwrap();
        let cache: CacheStorage<String> =
            CacheStorage::open_in(temp.path(), Some(Duration::from_secs(60))).unwrap();

        let stale = format!(
            r#"{{"stored_at": {}, "data": "old"}}"#,
            now_secs() - 3600
        );
        fs::write(temp.path().join("token.json"), stale).unwrap();
        assert_eq!(cache.load("token").unwrap(), None);

        cache.store("token", &"fresh".to_string()).unwrap();
        assert_eq!(cache.load("token").unwrap(), Some("fresh".to_string()));
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cache: CacheStorage<String> = CacheStorage::open_in(temp.path(), None).unwrap();

        fs::write(temp.path().join("broken.json"), "not json").unwrap();
        assert!(matches!(
            cache.load("broken"),
            Err(CacheError::DeserializationFailed { .. })
        ));
    }
}
