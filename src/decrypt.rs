//! Dictionary-driven decryption.
//!
//! [`Decryptor::decrypt_file`] asks the engine whether a file is encrypted,
//! and if so walks the candidate passwords strictly in order until the
//! engine accepts one. A wrong password (an Encrypted error) moves on to the
//! next candidate; any other engine error aborts the walk. Decrypted copies
//! are written as `decrypted_<name>` into the configured temp directory and
//! tracked until [`Decryptor::cleanup`].

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::config::DecryptConfig;
use crate::engine::PdfEngine;
use crate::error::{ErrorKind, PdfOpsError, Result};
use crate::output::progress::{ProgressEvent, ProgressSink};
use crate::password::PasswordManager;

/// Prefix of decrypted copies in the temp directory.
pub const DECRYPTED_PREFIX: &str = "decrypted_";

/// Result of a decryption run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    /// Readable file: the original when it was not encrypted, the decrypted
    /// copy otherwise.
    pub path: PathBuf,
    /// Password that worked, if one was needed.
    pub password: Option<String>,
    /// Whether `path` is the caller's original file.
    pub is_original: bool,
    /// Candidates tried.
    pub attempts: usize,
}

/// Tries candidate passwords against encrypted files.
pub struct Decryptor {
    engine: Arc<dyn PdfEngine>,
    passwords: Arc<PasswordManager>,
    config: DecryptConfig,
    temp_files: Mutex<Vec<PathBuf>>,
}

impl Decryptor {
    /// Create a decryptor.
    pub fn new(engine: Arc<dyn PdfEngine>, passwords: Arc<PasswordManager>, config: DecryptConfig) -> Self {
        Self {
            engine,
            passwords,
            config,
            temp_files: Mutex::new(Vec::new()),
        }
    }

    /// Password manager consulted and updated by this decryptor.
    pub fn passwords(&self) -> &Arc<PasswordManager> {
        &self.passwords
    }

    /// Where the decrypted copy of `path` is written.
    pub fn target_path(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        self.config.temp_dir.join(format!("{DECRYPTED_PREFIX}{name}"))
    }

    /// Make `path` readable, trying the cached password and then `dictionary`.
    ///
    /// At most `max_attempts` candidates are tried. A cached password for the
    /// file is tried first and counts as one of them.
    ///
    /// # Errors
    ///
    /// Encrypted when every candidate is rejected; the engine's error when it
    /// fails for any other reason; a cancellation error when `cancel` fires
    /// between candidates.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn decrypt_file(
        &self,
        path: &Path,
        dictionary: &[String],
        progress: Option<&dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<DecryptOutcome> {
        cancel.check()?;

        if !self.engine.is_encrypted(path).await? {
            debug!("not encrypted");
            return Ok(DecryptOutcome {
                path: path.to_path_buf(),
                password: None,
                is_original: true,
                attempts: 0,
            });
        }

        let target = self.target_path(path);
        tokio::fs::create_dir_all(&self.config.temp_dir)
            .await
            .map_err(|e| PdfOpsError::from(e).with_path(&self.config.temp_dir))?;

        let cached = self.passwords.get(path);
        let candidates = self.candidates(cached.as_deref(), dictionary);
        let total = candidates.len();
        if total == 0 {
            return Err(exhausted(path, 0));
        }

        let attempts = AtomicUsize::new(0);
        let (attempts_ref, target_ref) = (&attempts, &target);
        let engine = &self.engine;
        let delay = self.config.attempt_delay;

        let found = self
            .passwords
            .batch_try(path, &candidates, move |candidate| async move {
                let index = attempts_ref.fetch_add(1, Ordering::SeqCst);
                if index > 0 && !delay.is_zero() {
                    cancel.sleep(delay).await?;
                }
                cancel.check()?;

                if let Some(sink) = progress {
                    sink.report(&ProgressEvent::PasswordAttempt {
                        current: index + 1,
                        total,
                        candidate: &candidate,
                    });
                }

                engine.decrypt(path, target_ref, &candidate).await?;
                Ok(target_ref.clone())
            })
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match found {
            Ok((decrypted, password)) => {
                info!(attempts, "password accepted");
                self.register_temp(decrypted.clone());
                Ok(DecryptOutcome {
                    path: decrypted,
                    password: Some(password),
                    is_original: false,
                    attempts,
                })
            }
            Err(err) if err.kind() == ErrorKind::Encrypted => Err(exhausted(path, attempts)),
            Err(err) => {
                warn!(error = %err, "engine failed during decryption");
                Err(err)
            }
        }
    }

    /// Cached password first, then `dictionary` without it, capped at
    /// `max_attempts`.
    fn candidates(&self, cached: Option<&str>, dictionary: &[String]) -> Vec<String> {
        let mut list: Vec<String> = cached.map(str::to_string).into_iter().collect();
        list.extend(
            dictionary
                .iter()
                .filter(|candidate| Some(candidate.as_str()) != cached)
                .cloned(),
        );
        list.truncate(self.config.max_attempts);
        list
    }

    /// Track `path` for deletion on [`cleanup`](Self::cleanup). Duplicates
    /// are ignored.
    pub fn register_temp(&self, path: PathBuf) {
        let mut files = self.temp_files.lock();
        if !files.contains(&path) {
            files.push(path);
        }
    }

    /// Temp files currently tracked.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.temp_files.lock().clone()
    }

    /// Delete every tracked temp file. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let files = std::mem::take(&mut *self.temp_files.lock());
        let mut removed = 0;
        for file in files {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %file.display(), error = %err, "cannot remove temp file"),
            }
        }
        removed
    }
}

fn exhausted(path: &Path, attempts: usize) -> PdfOpsError {
    PdfOpsError::encrypted(format!("failed to decrypt after {attempts} attempts")).with_path(path)
}
