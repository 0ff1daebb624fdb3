//! Per-file password cache and dictionary ordering.
//!
//! The cache maps the MD5 of a file's absolute path to the password that
//! last opened it. Entries are advisory: callers always re-verify through the
//! engine, and a failed reuse evicts the entry. Every successful `set` also
//! bumps a global per-password counter, which drives
//! [`PasswordManager::optimized_list`].

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::strength::{Strength, strength};
use crate::error::{ErrorKind, PdfOpsError, Result};

/// Built-in candidate list: the empty password first, then common choices.
pub fn default_dictionary() -> Vec<String> {
    [
        "", "password", "123456", "12345678", "1234", "12345", "qwerty", "admin", "letmein",
        "welcome", "abc123", "password1", "111111", "123123", "secret", "changeme", "pdf",
        "test", "user", "owner",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Cache key for `path`: lowercase hex MD5 of the absolute path string.
pub fn cache_key(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("{:x}", md5::compute(absolute.to_string_lossy().as_bytes()))
}

#[derive(Debug, Default)]
struct Inner {
    dictionary: Vec<String>,
    cache: HashMap<String, String>,
    /// password -> (successes, first-seen sequence number)
    counters: HashMap<String, (u64, u64)>,
    next_seq: u64,
}

/// Thread-safe password cache, dictionary and success counters.
#[derive(Debug, Default)]
pub struct PasswordManager {
    inner: RwLock<Inner>,
}

impl PasswordManager {
    /// Manager with an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager using `dictionary` as its base candidate list.
    pub fn with_dictionary(dictionary: Vec<String>) -> Self {
        let manager = Self::new();
        manager.inner.write().dictionary = dictionary;
        manager
    }

    /// Base dictionary.
    pub fn dictionary(&self) -> Vec<String> {
        self.inner.read().dictionary.clone()
    }

    /// Replace the base dictionary.
    pub fn set_dictionary(&self, dictionary: Vec<String>) {
        self.inner.write().dictionary = dictionary;
    }

    /// Cached password for `path`.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.inner.read().cache.get(&cache_key(path)).cloned()
    }

    /// Cache `password` for `path` and count it as a success.
    pub fn set(&self, path: &Path, password: &str) {
        let key = cache_key(path);
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.cache.insert(key, password.to_string());

        let seq = inner.next_seq;
        let entry = inner.counters.entry(password.to_string()).or_insert((0, seq));
        entry.0 += 1;
        if entry.1 == seq {
            inner.next_seq += 1;
        }
    }

    /// Drop the cached password for `path`, returning it.
    pub fn remove(&self, path: &Path) -> Option<String> {
        self.inner.write().cache.remove(&cache_key(path))
    }

    /// Drop every cached password. Counters are kept.
    pub fn clear(&self) {
        self.inner.write().cache.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().cache.is_empty()
    }

    /// Successes recorded for `password`.
    pub fn success_count(&self, password: &str) -> u64 {
        self.inner
            .read()
            .counters
            .get(password)
            .map_or(0, |(count, _)| *count)
    }

    /// Passwords by descending success count (ties in first-success order),
    /// followed by the dictionary entries not already listed.
    pub fn optimized_list(&self) -> Vec<String> {
        let inner = self.inner.read();

        let mut ranked: Vec<(&String, u64, u64)> = inner
            .counters
            .iter()
            .map(|(password, (count, seq))| (password, *count, *seq))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let mut list: Vec<String> = ranked.into_iter().map(|(p, _, _)| p.clone()).collect();
        for candidate in &inner.dictionary {
            if !list.contains(candidate) {
                list.push(candidate.clone());
            }
        }
        list
    }

    /// Score a password. See [`strength`].
    pub fn strength(&self, password: &str) -> Strength {
        strength(password)
    }

    /// Copy of the cache, keyed by path hash.
    pub fn export_cache(&self) -> BTreeMap<String, String> {
        self.inner
            .read()
            .cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Merge `entries` (path hash -> password) into the cache. Counters are
    /// not touched.
    pub fn import_cache(&self, entries: BTreeMap<String, String>) {
        self.inner.write().cache.extend(entries);
    }

    /// Find a password that opens `path`.
    ///
    /// Tries the cached password first; if it fails it is evicted. Then each
    /// of `passwords` is tried in order, skipping the cached one. The first
    /// success is cached and returned with the path `decrypt` produced.
    ///
    /// # Errors
    ///
    /// Any non-Encrypted error from `decrypt` is returned immediately. If
    /// every candidate is rejected, an Encrypted error is returned.
    pub async fn batch_try<F, Fut>(
        &self,
        path: &Path,
        passwords: &[String],
        mut decrypt: F,
    ) -> Result<(PathBuf, String)>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        let cached = self.get(path);
        let mut tried = 0usize;
        if let Some(password) = &cached {
            tried += 1;
            match decrypt(password.clone()).await {
                Ok(dst) => {
                    debug!(path = %path.display(), "cached password accepted");
                    self.set(path, password);
                    return Ok((dst, password.clone()));
                }
                Err(err) if err.kind() == ErrorKind::Encrypted => {
                    debug!(path = %path.display(), "cached password rejected, evicting");
                    self.remove(path);
                }
                Err(err) => return Err(err),
            }
        }

        for password in passwords {
            if cached.as_ref() == Some(password) {
                continue;
            }
            tried += 1;
            match decrypt(password.clone()).await {
                Ok(dst) => {
                    info!(path = %path.display(), attempts = tried, "password found");
                    self.set(path, password);
                    return Ok((dst, password.clone()));
                }
                Err(err) if err.kind() == ErrorKind::Encrypted => continue,
                Err(err) => return Err(err),
            }
        }

        Err(PdfOpsError::encrypted(format!(
            "failed to decrypt after {tried} attempts"
        ))
        .with_path(path))
    }
}
