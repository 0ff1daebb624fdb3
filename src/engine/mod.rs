//! Narrow interface over the external PDF engine.
//!
//! The core never parses PDF bytes itself. Everything it needs from a PDF
//! backend is the six calls of [`PdfEngine`]. Two real backends exist:
//!
//! - [`CliEngine`]: spawns an engine binary and parses its text output
//! - [`NativeEngine`]: in-process, backed by `lopdf`
//!
//! [`discover`] picks one at startup; after that the rest of the crate only
//! sees `Arc<dyn PdfEngine>`. [`ScriptedEngine`] is a deterministic backend
//! for tests and dry runs.
//!
//! Engines are treated as non-reentrant: each backend serialises its own
//! calls through a per-handle mutex.

pub mod cli;
pub mod native;
pub mod scripted;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, EngineKind};
use crate::error::Result;
use crate::info::PdfInfo;

pub use cli::CliEngine;
pub use native::NativeEngine;
pub use scripted::ScriptedEngine;

/// Capabilities every engine backend provides.
///
/// `decrypt` reports a wrong password as [`crate::ErrorKind::Encrypted`];
/// any other kind means the file cannot be decrypted at all.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Short backend name used in logs and reports.
    fn name(&self) -> &str;

    /// Engine version string.
    async fn version(&self) -> Result<String>;

    /// Check that `path` is a well-formed PDF.
    async fn validate(&self, path: &Path) -> Result<()>;

    /// Extract the information record of `path`.
    async fn info(&self, path: &Path) -> Result<PdfInfo>;

    /// Whether `path` is encrypted.
    async fn is_encrypted(&self, path: &Path) -> Result<bool>;

    /// Decrypt `src` into `dst` using `password`.
    async fn decrypt(&self, src: &Path, dst: &Path, password: &str) -> Result<()>;

    /// Merge `inputs`, in order, into `dst`.
    async fn merge(&self, inputs: &[PathBuf], dst: &Path) -> Result<()>;
}

/// Whether an engine could be found. Captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineAvailability {
    /// Discovery has not run.
    #[default]
    Unknown,
    /// A backend answered its version probe.
    Available {
        /// Backend that answered.
        kind: EngineKind,
        /// Version string, suffixed with the backend, e.g. "0.8.1 (CLI)".
        version: String,
    },
    /// No backend answered.
    Unavailable {
        /// Why each probe failed.
        reason: String,
    },
}

impl EngineAvailability {
    /// Whether an engine can be used.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Result of engine discovery.
#[derive(Clone)]
pub struct Discovery {
    /// Frozen availability state.
    pub availability: EngineAvailability,
    /// The selected engine, if any.
    pub engine: Option<Arc<dyn PdfEngine>>,
}

impl Discovery {
    /// Wrap an already-constructed engine, probing its version.
    pub async fn with_engine(engine: Arc<dyn PdfEngine>, kind: EngineKind) -> Self {
        match engine.version().await {
            Ok(version) => Self {
                availability: EngineAvailability::Available {
                    kind,
                    version: format!("{version} ({kind})"),
                },
                engine: Some(engine),
            },
            Err(err) => Self::unavailable(err.to_string()),
        }
    }

    /// Discovery result with no engine.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            availability: EngineAvailability::Unavailable {
                reason: reason.into(),
            },
            engine: None,
        }
    }

    /// Version string of the selected engine, if any.
    pub fn version(&self) -> Option<&str> {
        match &self.availability {
            EngineAvailability::Available { version, .. } => Some(version),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("availability", &self.availability)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

/// Probe the configured backends in order and keep the first that answers.
pub async fn discover(config: &EngineConfig) -> Discovery {
    let mut failures = Vec::new();

    for kind in config.effective_order() {
        let engine: Arc<dyn PdfEngine> = match kind {
            EngineKind::Cli => Arc::new(CliEngine::new(config.cli_path.clone())),
            EngineKind::Library => Arc::new(NativeEngine::new()),
        };

        debug!(backend = %kind, "probing engine");
        match engine.version().await {
            Ok(version) => {
                let version = format!("{version} ({kind})");
                info!(%version, "engine available");
                return Discovery {
                    availability: EngineAvailability::Available { kind, version },
                    engine: Some(engine),
                };
            }
            Err(err) => {
                warn!(backend = %kind, error = %err, "engine probe failed");
                failures.push(format!("{kind}: {}", err.message()));
            }
        }
    }

    Discovery::unavailable(if failures.is_empty() {
        "no engine configured".to_string()
    } else {
        failures.join("; ")
    })
}

/// Raw-byte encryption prefilter.
///
/// Looks for an `/Encrypt` key anywhere in the file. This can report `true`
/// for an unencrypted file that mentions the name in a string literal, so
/// it is only consulted when no engine is available.
pub async fn quick_encryption_scan(path: &Path) -> Result<bool> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| crate::PdfOpsError::from(e).with_path(path))?;
    Ok(bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt"))
}
