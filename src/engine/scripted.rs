//! Deterministic engine for tests and dry runs.
//!
//! [`ScriptedEngine`] never parses PDF bytes. It records every call, answers
//! from configured state, and writes small marker files for `decrypt` and
//! `merge` so filesystem effects can be observed. A marker carries the page
//! count (`pages=N`), which lets merged outputs report the summed page count
//! of their inputs.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::PdfEngine;
use crate::error::{ErrorKind, PdfOpsError, Result};
use crate::info::PdfInfo;

/// Engine operation, used to target scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptedOp {
    /// `version`
    Version,
    /// `validate`
    Validate,
    /// `info`
    Info,
    /// `is_encrypted`
    IsEncrypted,
    /// `decrypt`
    Decrypt,
    /// `merge`
    Merge,
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `version()`
    Version,
    /// `validate(path)`
    Validate(PathBuf),
    /// `info(path)`
    Info(PathBuf),
    /// `is_encrypted(path)`
    IsEncrypted(PathBuf),
    /// `decrypt(src, dst, password)`
    Decrypt {
        /// Source file.
        src: PathBuf,
        /// Destination file.
        dst: PathBuf,
        /// Candidate password.
        password: String,
    },
    /// `merge(inputs, dst)`
    Merge {
        /// Inputs in order.
        inputs: Vec<PathBuf>,
        /// Destination file.
        dst: PathBuf,
    },
}

impl EngineCall {
    fn op(&self) -> ScriptedOp {
        match self {
            Self::Version => ScriptedOp::Version,
            Self::Validate(_) => ScriptedOp::Validate,
            Self::Info(_) => ScriptedOp::Info,
            Self::IsEncrypted(_) => ScriptedOp::IsEncrypted,
            Self::Decrypt { .. } => ScriptedOp::Decrypt,
            Self::Merge { .. } => ScriptedOp::Merge,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<EngineCall>,
    passwords: HashSet<String>,
    encrypted: HashSet<PathBuf>,
    page_counts: HashMap<PathBuf, usize>,
    /// Remaining forced failures per operation.
    failures: HashMap<ScriptedOp, (ErrorKind, usize)>,
    /// Zero-based merge call index that fails.
    merge_failures: HashMap<usize, ErrorKind>,
    decrypt_error: Option<ErrorKind>,
    merges_seen: usize,
}

/// Scripted in-memory engine.
#[derive(Debug)]
pub struct ScriptedEngine {
    name: String,
    latency: Duration,
    script: Mutex<Script>,
    lock: tokio::sync::Mutex<()>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Engine with no passwords, no encrypted files and no failures.
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            latency: Duration::ZERO,
            script: Mutex::new(Script::default()),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Name reported by [`PdfEngine::name`].
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept `password` when decrypting.
    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.script.lock().passwords.insert(password.into());
        self
    }

    /// Report `path` as encrypted.
    pub fn with_encrypted(self, path: impl Into<PathBuf>) -> Self {
        self.script.lock().encrypted.insert(path.into());
        self
    }

    /// Report `pages` pages for `path`.
    pub fn with_pages(self, path: impl Into<PathBuf>, pages: usize) -> Self {
        self.script.lock().page_counts.insert(path.into(), pages);
        self
    }

    /// Fail the next `times` calls of `op` with `kind`.
    pub fn fail_times(self, op: ScriptedOp, kind: ErrorKind, times: usize) -> Self {
        self.script.lock().failures.insert(op, (kind, times));
        self
    }

    /// Fail the merge call with zero-based index `call` with `kind`.
    pub fn fail_merge_call(self, call: usize, kind: ErrorKind) -> Self {
        self.script.lock().merge_failures.insert(call, kind);
        self
    }

    /// Fail every decrypt of an encrypted file with `kind`, whatever the
    /// password.
    pub fn with_decrypt_error(self, kind: ErrorKind) -> Self {
        self.script.lock().decrypt_error = Some(kind);
        self
    }

    /// Snapshot of every call made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script.lock().calls.clone()
    }

    /// Number of calls made to `op`.
    pub fn call_count(&self, op: ScriptedOp) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// `(inputs, dst)` of every merge call, in order.
    pub fn merge_calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Merge { inputs, dst } => Some((inputs.clone(), dst.clone())),
                _ => None,
            })
            .collect()
    }

    /// Candidate passwords passed to `decrypt`, in order.
    pub fn decrypt_passwords(&self) -> Vec<String> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Decrypt { password, .. } => Some(password.clone()),
                _ => None,
            })
            .collect()
    }

    /// Record `call` and apply any scripted failure for it.
    async fn enter(&self, call: EngineCall) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        let guard = self.lock.lock().await;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut script = self.script.lock();
        let op = call.op();
        script.calls.push(call);

        if op == ScriptedOp::Merge {
            let index = script.merges_seen;
            script.merges_seen += 1;
            if let Some(kind) = script.merge_failures.get(&index) {
                return Err(PdfOpsError::new(*kind, format!("scripted merge {index} failed")));
            }
        }

        if let Some((kind, remaining)) = script.failures.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(PdfOpsError::new(*kind, format!("scripted {op:?} failure")));
        }

        Ok(guard)
    }

    fn pages_of(&self, path: &Path) -> usize {
        if let Some(pages) = self.script.lock().page_counts.get(path) {
            return *pages;
        }
        std::fs::read_to_string(path)
            .ok()
            .and_then(|text| parse_marker_pages(&text))
            .unwrap_or(1)
    }

    fn is_scripted_encrypted(&self, path: &Path) -> bool {
        self.script.lock().encrypted.contains(path)
    }
}

fn parse_marker_pages(text: &str) -> Option<usize> {
    text.lines()
        .find_map(|line| line.strip_prefix("pages="))
        .and_then(|n| n.trim().parse().ok())
}

async fn write_marker(dst: &Path, kind: &str, pages: usize) -> Result<()> {
    let body = format!("%PDF-scripted {kind}\npages={pages}\n");
    tokio::fs::write(dst, body)
        .await
        .map_err(|e| PdfOpsError::from(e).with_path(dst))
}

#[async_trait]
impl PdfEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn version(&self) -> Result<String> {
        let _guard = self.enter(EngineCall::Version).await?;
        Ok("scripted-1.0".to_string())
    }

    async fn validate(&self, path: &Path) -> Result<()> {
        let _guard = self.enter(EngineCall::Validate(path.to_path_buf())).await?;
        if self.script.lock().page_counts.contains_key(path) || path.exists() {
            Ok(())
        } else {
            Err(PdfOpsError::io("no such file or directory").with_path(path))
        }
    }

    async fn info(&self, path: &Path) -> Result<PdfInfo> {
        let _guard = self.enter(EngineCall::Info(path.to_path_buf())).await?;
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let encrypted = self.is_scripted_encrypted(path);
        Ok(PdfInfo::builder(path)
            .file_size(file_size)
            .page_count(self.pages_of(path))
            .version("1.7")
            .encrypted(encrypted)
            .user_password(encrypted)
            .owner_password(encrypted)
            .build())
    }

    async fn is_encrypted(&self, path: &Path) -> Result<bool> {
        let _guard = self.enter(EngineCall::IsEncrypted(path.to_path_buf())).await?;
        Ok(self.is_scripted_encrypted(path))
    }

    async fn decrypt(&self, src: &Path, dst: &Path, password: &str) -> Result<()> {
        let _guard = self
            .enter(EngineCall::Decrypt {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                password: password.to_string(),
            })
            .await?;

        if self.is_scripted_encrypted(src) {
            let (fatal, accepted) = {
                let script = self.script.lock();
                (script.decrypt_error, script.passwords.contains(password))
            };
            if let Some(kind) = fatal {
                return Err(PdfOpsError::new(kind, "scripted decrypt failure").with_path(src));
            }
            if !accepted {
                return Err(PdfOpsError::encrypted("incorrect password").with_path(src));
            }
        }

        write_marker(dst, "decrypted", self.pages_of(src)).await
    }

    async fn merge(&self, inputs: &[PathBuf], dst: &Path) -> Result<()> {
        let _guard = self
            .enter(EngineCall::Merge {
                inputs: inputs.to_vec(),
                dst: dst.to_path_buf(),
            })
            .await?;

        if inputs.is_empty() {
            return Err(PdfOpsError::invalid_file("no files to merge"));
        }
        let pages = inputs.iter().map(|p| self.pages_of(p)).sum();
        write_marker(dst, "merged", pages).await
    }
}
