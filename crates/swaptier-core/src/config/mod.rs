//! Persisted swap configuration.
//!
//! - `fstab`: mount-table entries for file-backed swap
//! - `generator`: zram-generator sections for compressed-memory devices
//! - `lock`: exclusive lock around mutating commands

pub mod fstab;
pub mod generator;
pub mod lock;

pub use fstab::{FstabStore, PersistedEntry};
pub use generator::{GeneratorSection, GeneratorSize, GeneratorStore};
pub use lock::ConfigLock;
