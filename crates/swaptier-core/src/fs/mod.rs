//! Filesystem access used by the probe and the configuration stores.
//!
//! Every read of live or persisted state and every rewrite of a persisted
//! record goes through the [`FileSystem`] trait, so the same code runs
//! against the real host, a privilege-escalating adapter, or [`MockFs`].

pub mod mock;
pub mod traits;

pub use mock::MockFs;
pub use traits::{FileSystem, RealFs};
