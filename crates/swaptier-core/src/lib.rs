//! swaptier-core: tiered swap management library.
//!
//! Provides:
//! - `size`: human capacity strings ("8G", "512") to exact byte counts
//! - `fs`: filesystem seam (real, privileged, in-memory mock)
//! - `exec`: structured external operations (real executor, simulated host)
//! - `probe`: live swap table reader and classifier
//! - `config`: persisted swap record, zram generator config, mutation lock
//! - `priority`: effective priority resolution across live and persisted state
//! - `entity`: file-backed and compressed-memory lifecycle operations
//! - `orchestrator`: conflict resolution and hybrid (zram + file) setup
//! - `fmt`: shared formatting helpers

pub mod config;
pub mod entity;
pub mod error;
pub mod exec;
pub mod fmt;
pub mod fs;
pub mod host;
pub mod orchestrator;
pub mod priority;
pub mod probe;
pub mod size;

pub use error::SwapError;
pub use host::{Host, HostPaths};
