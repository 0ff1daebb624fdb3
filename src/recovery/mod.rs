//! Retry, memory monitoring and the recovery orchestrator that combines them.

pub mod memory;
pub mod orchestrator;
pub mod retry;

pub use memory::{MemoryMonitor, MemoryProbe, MemoryUsage, ProcessMemory};
pub use orchestrator::{DEFAULT_IO_PAUSE, RecoveryOrchestrator};
pub use retry::{AttemptHook, NoHook, Recovery, RetryController, RetryOutcome};
