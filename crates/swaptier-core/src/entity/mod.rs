//! Swap entity lifecycles.
//!
//! File-backed swap: `Absent -> Allocated -> Formatted -> Active -> Persisted`.
//!
//! Compressed-memory swap: `Absent -> ModuleLoaded -> DeviceAllocated ->
//! Formatted -> Active -> GeneratorPersisted`.
//!
//! Every destructive sequence runs deactivate, then reallocate/reformat,
//! then reactivate, then repersist. A failure stops the sequence and the
//! error names the state reached so far.

pub mod file;
pub mod zram;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::SwapError;
use crate::exec::{CommandExecutor, Operation, PriorityFlag};
use crate::fmt::format_priority;
use crate::fs::FileSystem;
use crate::host::Host;
use crate::probe::{SwapKind, ZRAM_MARKER};

pub use file::FileSwap;
pub use zram::ZramSwap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Absent,
    Allocated,
    Formatted,
    Active,
    Persisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZramState {
    Absent,
    ModuleLoaded,
    DeviceAllocated,
    Formatted,
    Active,
    GeneratorPersisted,
}

/// State of either lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntityState {
    File(FileState),
    Zram(ZramState),
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityState::File(FileState::Absent) | EntityState::Zram(ZramState::Absent) => {
                "absent"
            }
            EntityState::File(FileState::Allocated) => "allocated",
            EntityState::File(FileState::Formatted) | EntityState::Zram(ZramState::Formatted) => {
                "formatted, inactive"
            }
            EntityState::File(FileState::Active) | EntityState::Zram(ZramState::Active) => {
                "active"
            }
            EntityState::File(FileState::Persisted) => "active, persisted",
            EntityState::Zram(ZramState::ModuleLoaded) => "module loaded",
            EntityState::Zram(ZramState::DeviceAllocated) => "device allocated",
            EntityState::Zram(ZramState::GeneratorPersisted) => "active, generator persisted",
        };
        f.write_str(name)
    }
}

/// Durability of the change an operation made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// The persisted record matches the live state.
    Durable,
    /// The runtime change succeeded but could not be persisted.
    Degraded(String),
    /// Persistence was not requested.
    NotRequested,
    /// Persisted entries were removed.
    Removed,
}

/// Terminal report of a successful (possibly degraded) operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Identifier the resource ended up with; a zram resize may move it.
    pub identifier: String,
    pub state: EntityState,
    pub persistence: Persistence,
    pub notes: Vec<String>,
}

impl Outcome {
    pub(crate) fn new(identifier: impl Into<String>, state: EntityState) -> Self {
        Self {
            identifier: identifier.into(),
            state,
            persistence: Persistence::NotRequested,
            notes: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.persistence, Persistence::Degraded(_))
    }

    pub(crate) fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// One requested change, produced by the orchestrator and consumed by a
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredOperation {
    Create {
        /// Swap file path or zram device; backend default when `None`.
        target: Option<String>,
        size: String,
        priority: Option<i32>,
        persist: bool,
    },
    Resize {
        target: String,
        size: String,
    },
    Reprioritize {
        target: String,
        priority: i32,
    },
    Remove {
        target: String,
    },
}

/// Backend kind a [`DesiredOperation`] is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    FileBacked,
    CompressedMemory,
}

impl Backend {
    pub fn for_identifier(identifier: &str) -> Self {
        if identifier.contains(ZRAM_MARKER) || identifier.starts_with("zram") {
            Backend::CompressedMemory
        } else {
            Backend::FileBacked
        }
    }

    /// Backend managing a live resource kind; `Other` (partitions) has none.
    pub fn for_kind(kind: SwapKind) -> Option<Self> {
        match kind {
            SwapKind::FileBacked => Some(Backend::FileBacked),
            SwapKind::CompressedMemory => Some(Backend::CompressedMemory),
            SwapKind::Other => None,
        }
    }

    pub fn apply<F: FileSystem, E: CommandExecutor>(
        &self,
        host: &Host<F, E>,
        op: &DesiredOperation,
    ) -> Result<Outcome, SwapError> {
        match self {
            Backend::FileBacked => {
                let swap = FileSwap::new(host);
                match op {
                    DesiredOperation::Create {
                        target,
                        size,
                        priority,
                        persist,
                    } => {
                        let default = host.paths().default_swapfile.to_string_lossy();
                        let path = target.as_deref().unwrap_or(&default);
                        swap.create(path, size, *priority, *persist)
                    }
                    DesiredOperation::Resize { target, size } => swap.resize(target, size),
                    DesiredOperation::Reprioritize { target, priority } => {
                        swap.reprioritize(target, *priority)
                    }
                    DesiredOperation::Remove { target } => swap.remove(target),
                }
            }
            Backend::CompressedMemory => {
                let swap = ZramSwap::new(host);
                match op {
                    DesiredOperation::Create {
                        target,
                        size,
                        priority,
                        persist,
                    } => swap.create(target.as_deref(), size, *priority, *persist),
                    DesiredOperation::Resize { target, size } => swap.resize(target, size),
                    DesiredOperation::Reprioritize { target, priority } => {
                        swap.reprioritize(target, *priority)
                    }
                    DesiredOperation::Remove { target } => swap.remove(target),
                }
            }
        }
    }
}

/// Activates `target`, trying the long then the short priority flag.
pub(crate) fn activate<F: FileSystem, E: CommandExecutor>(
    host: &Host<F, E>,
    target: &str,
    priority: Option<i32>,
) -> Result<(), String> {
    let op = |flag| Operation::Activate {
        target: target.to_string(),
        priority,
        flag,
    };

    let long = host.run(&op(PriorityFlag::Long));
    if long.is_success() {
        info!("{}: activated (priority {})", target, format_priority(priority));
        return Ok(());
    }
    if priority.is_none() {
        return Err(long.diagnostic());
    }

    warn!(
        "{}: long priority flag rejected ({}); retrying with short flag",
        target,
        long.diagnostic()
    );
    let short = host.run(&op(PriorityFlag::Short));
    if short.is_success() {
        info!("{}: activated (priority {})", target, format_priority(priority));
        return Ok(());
    }
    Err(format!("{}; {}", long.diagnostic(), short.diagnostic()))
}

/// Result of taking a resource offline.
pub(crate) enum Deactivation {
    Done,
    NotActive,
    /// No deactivation tool on this host.
    Unavailable(String),
    Failed(String),
}

pub(crate) fn deactivate<F: FileSystem, E: CommandExecutor>(
    host: &Host<F, E>,
    target: &str,
) -> Deactivation {
    if !host.probe().is_active(target) {
        return Deactivation::NotActive;
    }
    let outcome = host.run(&Operation::Deactivate {
        target: target.to_string(),
    });
    if outcome.is_success() {
        info!("{}: deactivated", target);
        Deactivation::Done
    } else if outcome.is_unavailable() {
        Deactivation::Unavailable(outcome.diagnostic())
    } else {
        Deactivation::Failed(outcome.diagnostic())
    }
}

/// Result of a runtime priority change.
pub(crate) enum RuntimeChange {
    Applied,
    /// Deactivation is unavailable; the live priority is unchanged.
    Skipped(String),
}

pub(crate) enum RuntimeFailure {
    Deactivate(String),
    Activate(String),
}

/// Deactivates and reactivates a live resource with `priority`.
pub(crate) fn reactivate_with_priority<F: FileSystem, E: CommandExecutor>(
    host: &Host<F, E>,
    target: &str,
    priority: i32,
) -> Result<RuntimeChange, RuntimeFailure> {
    match deactivate(host, target) {
        Deactivation::Done | Deactivation::NotActive => {}
        Deactivation::Unavailable(detail) => {
            warn!("{}: cannot deactivate ({}); live priority unchanged", target, detail);
            return Ok(RuntimeChange::Skipped(detail));
        }
        Deactivation::Failed(detail) => return Err(RuntimeFailure::Deactivate(detail)),
    }
    activate(host, target, Some(priority)).map_err(RuntimeFailure::Activate)?;
    Ok(RuntimeChange::Applied)
}
