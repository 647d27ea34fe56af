//! On-disk memoisation cache for slow system queries
//!
//! Entries live under `<temp>/draconis++/<key>_cache.beve`. Each file holds a
//! MessagePack envelope tagged with a schema version; freshness is judged
//! from the file's modification time. Writes go to a sibling `.tmp` file and
//! are renamed over the target, so readers only ever see complete payloads.

use crate::error::{DracError, DracErrorCode, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Default time-to-live for cache entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

const CACHE_DIR_NAME: &str = "draconis++";
const CACHE_SUFFIX: &str = "_cache.beve";
const SCHEMA_VERSION: u32 = 1;
const FORBIDDEN_KEY_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    schema: u32,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    schema: u32,
    value: T,
}

/// Keyed binary cache on the filesystem
#[derive(Debug, Clone)]
pub struct CacheManager {
    dir: PathBuf,
    default_ttl: Duration,
    ignore_cache: bool,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Cache rooted at `<system temp>/draconis++`. The directory is created on first write.
    pub fn new() -> Self {
        Self::with_dir(std::env::temp_dir().join(CACHE_DIR_NAME))
    }

    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            default_ttl: DEFAULT_TTL,
            ignore_cache: false,
        }
    }

    /// When set, `get_or_set` always runs the producer and overwrites the entry.
    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.ignore_cache = ignore;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}{}", key, CACHE_SUFFIX)))
    }

    /// Return a fresh entry for `key`, or run `producer` and persist its result.
    ///
    /// Producer errors propagate unchanged and leave the cache untouched.
    pub fn get_or_set<T, F>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.get_or_set_if(key, ttl, |_| true, producer)
    }

    /// Like [`get_or_set`](Self::get_or_set), but a fresh entry rejected by
    /// `accept` counts as a miss and is overwritten.
    pub fn get_or_set_if<T, A, F>(&self, key: &str, ttl: Duration, accept: A, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        A: Fn(&T) -> bool,
        F: FnOnce() -> Result<T>,
    {
        validate_key(key)?;

        if !self.ignore_cache {
            match self.read_fresh(key, ttl) {
                Ok(value) if accept(&value) => {
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Ok(_) => debug!(key, "cache entry rejected"),
                Err(err) => debug!(key, %err, "cache miss"),
            }
        }

        let value = producer()?;

        // A failed write only costs us the memoisation.
        if let Err(err) = self.write(key, &value) {
            warn!(key, %err, "failed to persist cache entry");
        }

        Ok(value)
    }

    /// Like [`get_or_set`](Self::get_or_set) with the manager's default TTL.
    pub fn get_or_set_default<T, F>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.get_or_set(key, self.default_ttl, producer)
    }

    /// Read and decode an entry without checking its age
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let path = self.path_for(key)?;
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                DracError::new(DracErrorCode::NotFound, format!("no cache entry for '{}'", key))
            } else {
                DracError::from(err)
            }
        })?;
        decode(key, &bytes)
    }

    /// Read an entry only if it was written within `ttl`.
    ///
    /// Missing, expired and corrupt entries all report `NotFound`.
    pub fn read_fresh<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Result<T> {
        let path = self.path_for(key)?;

        let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(_) => {
                return Err(DracError::new(
                    DracErrorCode::NotFound,
                    format!("no cache entry for '{}'", key),
                ))
            }
        };

        if !is_fresh(modified, SystemTime::now(), ttl) {
            return Err(DracError::new(
                DracErrorCode::NotFound,
                format!("cache entry for '{}' has expired", key),
            ));
        }

        match self.read(key) {
            Ok(value) => Ok(value),
            Err(err) if err.code == DracErrorCode::ParseError => {
                warn!(key, %err, "discarding corrupt cache entry");
                Err(DracError::new(
                    DracErrorCode::NotFound,
                    format!("cache entry for '{}' is corrupt", key),
                ))
            }
            Err(err) => Err(err),
        }
    }

    /// Atomically overwrite the entry for `key`
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key)?;

        fs::create_dir_all(&self.dir).map_err(|err| {
            DracError::new(
                DracErrorCode::IoError,
                format!("failed to create cache directory {}: {}", self.dir.display(), err),
            )
        })?;

        let bytes = rmp_serde::to_vec_named(&EnvelopeRef {
            schema: SCHEMA_VERSION,
            value,
        })
        .map_err(|err| {
            DracError::new(
                DracErrorCode::ParseError,
                format!("failed to encode cache entry '{}': {}", key, err),
            )
        })?;

        let tmp_path = tmp_path_for(&path);
        let guard = scopeguard::guard(tmp_path.clone(), |tmp| {
            let _ = fs::remove_file(tmp);
        });

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        scopeguard::ScopeGuard::into_inner(guard);

        debug!(key, bytes = bytes.len(), "cache entry written");
        Ok(())
    }

    /// Remove the entry for `key`. A missing entry is not an error.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every cache entry, returning how many files were deleted
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let is_cache_file = entry
                .file_name()
                .to_str()
                .map(|name| name.ends_with(CACHE_SUFFIX) || name.ends_with(".tmp"))
                .unwrap_or(false);
            if is_cache_file {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(DracError::new(
            DracErrorCode::InvalidArgument,
            "cache key must not be empty",
        ));
    }
    if let Some(bad) = key.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(DracError::new(
            DracErrorCode::InvalidArgument,
            format!("cache key '{}' contains forbidden character '{}'", key, bad),
        ));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = rmp_serde::from_slice(bytes).map_err(|err| {
        DracError::new(
            DracErrorCode::ParseError,
            format!("failed to decode cache entry '{}': {}", key, err),
        )
    })?;

    if envelope.schema != SCHEMA_VERSION {
        return Err(DracError::new(
            DracErrorCode::ParseError,
            format!(
                "cache entry '{}' has schema {} (expected {})",
                key, envelope.schema, SCHEMA_VERSION
            ),
        ));
    }

    Ok(envelope.value)
}

/// `now - modified <= ttl`. Timestamps in the future count as fresh.
fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age <= ttl,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn cache() -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dir(dir.path().join(CACHE_DIR_NAME));
        (dir, cache)
    }

    #[test]
    fn rejects_bad_keys_before_touching_disk() {
        let (_dir, cache) = cache();
        for key in ["", "../etc/passwd", "a\\b", "c:d", "x*", "q?", "\"", "<", ">", "a|b"] {
            let err = cache.write(key, &1u32).unwrap_err();
            assert_eq!(err.code, DracErrorCode::InvalidArgument, "key {:?}", key);
        }
        assert!(!cache.dir().exists());
    }

    #[test]
    fn rejected_entry_is_refreshed() {
        let (_dir, cache) = cache();
        cache.write("units", &"metric".to_string()).unwrap();

        let kept = cache
            .get_or_set_if("units", DEFAULT_TTL, |v: &String| v == "metric", || Ok("unused".to_string()))
            .unwrap();
        assert_eq!(kept, "metric");

        let calls = Cell::new(0);
        let replaced = cache
            .get_or_set_if("units", DEFAULT_TTL, |v: &String| v == "imperial", || {
                calls.set(calls.get() + 1);
                Ok("imperial".to_string())
            })
            .unwrap();
        assert_eq!(replaced, "imperial");
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.read::<String>("units").unwrap(), "imperial");
    }

    #[test]
    fn path_uses_beve_suffix() {
        let (_dir, cache) = cache();
        let path = cache.path_for("kernel").unwrap();
        assert!(path.ends_with("kernel_cache.beve"));
    }

    #[test]
    fn producer_error_leaves_cache_untouched() {
        let (_dir, cache) = cache();
        cache.write("k", &"old".to_string()).unwrap();

        let err = cache
            .clone()
            .ignore_cache(true)
            .get_or_set::<String, _>("k", DEFAULT_TTL, || {
                Err(DracError::new(DracErrorCode::ApiUnavailable, "down"))
            })
            .unwrap_err();
        assert_eq!(err.code, DracErrorCode::ApiUnavailable);
        assert_eq!(cache.read::<String>("k").unwrap(), "old");
    }

    #[test]
    fn ignore_cache_always_runs_producer() {
        let (_dir, cache) = cache();
        let cache = cache.ignore_cache(true);
        let calls = Cell::new(0);
        for _ in 0..3 {
            let value: u32 = cache
                .get_or_set("count", DEFAULT_TTL, || {
                    calls.set(calls.get() + 1);
                    Ok(calls.get())
                })
                .unwrap();
            assert_eq!(value, calls.get());
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn corrupt_entry_is_a_parse_error_on_read_and_a_miss_when_fresh() {
        let (_dir, cache) = cache();
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.path_for("bad").unwrap(), b"\xc1\xc1garbage").unwrap();

        assert_eq!(
            cache.read::<String>("bad").unwrap_err().code,
            DracErrorCode::ParseError
        );
        assert_eq!(
            cache.read_fresh::<String>("bad", DEFAULT_TTL).unwrap_err().code,
            DracErrorCode::NotFound
        );

        let value: String = cache
            .get_or_set("bad", DEFAULT_TTL, || Ok("fixed".to_string()))
            .unwrap();
        assert_eq!(value, "fixed");
        assert_eq!(cache.read::<String>("bad").unwrap(), "fixed");
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        #[derive(Serialize)]
        struct Future<'a> {
            schema: u32,
            value: &'a str,
        }
        let (_dir, cache) = cache();
        fs::create_dir_all(cache.dir()).unwrap();
        let bytes = rmp_serde::to_vec_named(&Future { schema: 99, value: "v" }).unwrap();
        fs::write(cache.path_for("future").unwrap(), bytes).unwrap();

        let err = cache.read::<String>("future").unwrap_err();
        assert_eq!(err.code, DracErrorCode::ParseError);
        assert!(err.message.contains("schema 99"));
    }

    #[test]
    fn clear_removes_only_cache_files() {
        let (_dir, cache) = cache();
        cache.write("a", &1u8).unwrap();
        cache.write("b", &2u8).unwrap();
        fs::write(cache.dir().join("keep.txt"), b"x").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.dir().join("keep.txt").exists());
        assert!(cache.read::<u8>("a").unwrap_err().is_not_found());
    }

    #[test]
    fn freshness_boundary() {
        let now = SystemTime::now();
        let ttl = Duration::from_secs(60);
        assert!(is_fresh(now - Duration::from_secs(60), now, ttl));
        assert!(!is_fresh(now - Duration::from_secs(61), now, ttl));
        assert!(is_fresh(now + Duration::from_secs(5), now, ttl));
    }
}
