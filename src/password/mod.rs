//! Password cache, candidate ordering and strength scoring.

pub mod manager;
pub mod store;
pub mod strength;

pub use manager::{PasswordManager, cache_key, default_dictionary};
pub use strength::{COMMON_PASSWORDS, Strength, StrengthLevel, strength};
