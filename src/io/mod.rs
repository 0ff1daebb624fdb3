//! Filesystem side of write operations: output naming, rollback, and
//! pre-flight checks.

pub mod guard;
pub mod paths;
pub mod rollback;

pub use guard::{robust_file_operation, safe_output_operation};
pub use paths::{OutputResolver, ensure_parent_dir, validate_extension};
pub use rollback::{RollbackManager, RollbackToken};
