//! Hybrid reconciliation: compressed memory in front of a swap file.
//!
//! ```text
//! classify live ──► empty? ──no──► DecisionMaker
//!                     │              ├─ Abort   → return, nothing changed
//!                     │              ├─ Resize  → resize one resource, return
//!                     │              ├─ Replace → remove zram + files
//!                     │              └─ Coexist
//!                     ▼
//!             zram tier (optional, failure recorded)
//!                     ▼
//!             file tier (mandatory, failure stops the flow)
//! ```
//!
//! The compressed tier is expected to carry the higher priority number so
//! the kernel prefers it; that convention is not enforced.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{GeneratorSection, PersistedEntry};
use crate::entity::{Backend, DesiredOperation, Outcome};
use crate::error::SwapError;
use crate::exec::CommandExecutor;
use crate::fs::FileSystem;
use crate::host::Host;
use crate::probe::{Classification, SwapKind, SwapResource};

/// Default priority of the compressed-memory tier.
pub const DEFAULT_ZRAM_PRIORITY: i32 = 100;
/// Default priority of the file-backed tier.
pub const DEFAULT_FILE_PRIORITY: i32 = -1;

/// Operator answer when swap is already active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Keep existing resources and add new ones next to them.
    Coexist,
    /// Remove existing zram devices and swap files first.
    Replace,
    /// Resize one existing resource instead of building a hybrid.
    Resize { identifier: String, size: String },
    /// Change nothing.
    Abort,
}

/// Source of conflict decisions: an interactive prompt or a fixed flag.
pub trait DecisionMaker {
    fn resolve_conflict(&mut self, existing: &Classification) -> ConflictChoice;
}

/// Always answers with the same choice.
#[derive(Debug, Clone)]
pub struct FixedChoice(pub ConflictChoice);

impl DecisionMaker for FixedChoice {
    fn resolve_conflict(&mut self, _existing: &Classification) -> ConflictChoice {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRequest {
    pub size: String,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridRequest {
    /// Compressed-memory tier; skipped when `None`.
    pub zram: Option<TierRequest>,
    pub file: TierRequest,
    /// Swap file path; derived from the default when `None`.
    pub file_path: Option<String>,
    pub persist: bool,
}

#[derive(Debug)]
pub enum HybridStatus {
    /// The file tier is active (the zram tier may have failed; see `failures`).
    Complete,
    /// A mandatory step failed; earlier changes are kept.
    Incomplete(SwapError),
    /// The operator aborted before any change.
    Aborted,
    /// An existing resource was resized instead.
    Resized,
}

/// Everything a hybrid run did.
#[derive(Debug)]
pub struct HybridReport {
    pub status: HybridStatus,
    /// Live resources found before any change.
    pub existing: Classification,
    /// Resources removed by `Replace`.
    pub removed: Vec<Outcome>,
    /// Resources created or resized.
    pub tiers: Vec<Outcome>,
    /// Optional steps that failed without stopping the run.
    pub failures: Vec<SwapError>,
    pub notes: Vec<String>,
}

impl HybridReport {
    fn new(existing: Classification) -> Self {
        Self {
            status: HybridStatus::Complete,
            existing,
            removed: Vec::new(),
            tiers: Vec::new(),
            failures: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn stop(mut self, err: SwapError) -> Self {
        self.status = HybridStatus::Incomplete(err);
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, HybridStatus::Complete | HybridStatus::Resized)
    }
}

/// Snapshot of live and persisted swap state.
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub active: Vec<SwapResource>,
    pub classification: Classification,
    pub persisted: Vec<PersistedEntry>,
    pub generator_available: bool,
    pub generator_sections: Vec<GeneratorSection>,
}

/// Entry point for every request that spans backends.
pub struct Orchestrator<'h, F: FileSystem, E: CommandExecutor> {
    host: &'h Host<F, E>,
}

impl<'h, F: FileSystem, E: CommandExecutor> Orchestrator<'h, F, E> {
    pub fn new(host: &'h Host<F, E>) -> Self {
        Self { host }
    }

    pub fn inspect(&self) -> Result<Inventory, SwapError> {
        let active = self.host.probe().list_active();
        let classification = crate::probe::classify(&active);
        let generator = self.host.generator();
        Ok(Inventory {
            active,
            classification,
            persisted: self.host.fstab().entries()?,
            generator_available: generator.is_available(),
            generator_sections: generator.sections()?,
        })
    }

    /// Applies one operation, dispatching on its target. A create without
    /// a target makes a swap file.
    pub fn apply(&self, op: &DesiredOperation) -> Result<Outcome, SwapError> {
        let backend = match op {
            DesiredOperation::Create { target: None, .. } => Backend::FileBacked,
            DesiredOperation::Create {
                target: Some(target),
                ..
            }
            | DesiredOperation::Resize { target, .. }
            | DesiredOperation::Reprioritize { target, .. }
            | DesiredOperation::Remove { target } => Backend::for_identifier(target),
        };
        backend.apply(self.host, op)
    }

    /// Builds a zram + swap file hybrid, asking `decisions` what to do with
    /// resources that are already active.
    pub fn hybrid(&self, request: &HybridRequest, decisions: &mut dyn DecisionMaker) -> HybridReport {
        let existing = self.host.probe().classify();
        let mut report = HybridReport::new(existing.clone());

        if !existing.is_empty() {
            let choice = decisions.resolve_conflict(&existing);
            info!("hybrid: existing swap found, choice {:?}", choice);
            match choice {
                ConflictChoice::Abort => {
                    report.status = HybridStatus::Aborted;
                    return report;
                }
                ConflictChoice::Resize { identifier, size } => {
                    return self.resize_existing(report, &identifier, &size);
                }
                ConflictChoice::Replace => {
                    if let Err(e) = self.replace(&mut report) {
                        return report.stop(e);
                    }
                }
                ConflictChoice::Coexist => {}
            }
        }

        if let Some(zram) = &request.zram {
            let op = DesiredOperation::Create {
                target: None,
                size: zram.size.clone(),
                priority: Some(zram.priority.unwrap_or(DEFAULT_ZRAM_PRIORITY)),
                persist: request.persist,
            };
            match Backend::CompressedMemory.apply(self.host, &op) {
                Ok(outcome) => report.tiers.push(outcome),
                Err(e) => {
                    warn!("hybrid: zram tier failed: {}; continuing with swap file", e);
                    report.failures.push(e);
                }
            }
        }

        let path = match self.file_path(request.file_path.as_deref()) {
            Ok(path) => path,
            Err(e) => return report.stop(e),
        };
        if request.file_path.is_none() && path != self.default_path() {
            report
                .notes
                .push(format!("{} is taken; using {}", self.default_path(), path));
        }
        let op = DesiredOperation::Create {
            target: Some(path),
            size: request.file.size.clone(),
            priority: Some(request.file.priority.unwrap_or(DEFAULT_FILE_PRIORITY)),
            persist: request.persist,
        };
        match Backend::FileBacked.apply(self.host, &op) {
            Ok(outcome) => report.tiers.push(outcome),
            Err(e) => return report.stop(e),
        }
        report
    }

    fn resize_existing(&self, mut report: HybridReport, identifier: &str, size: &str) -> HybridReport {
        let backend = match report.existing.kind_of(identifier) {
            Some(kind) => Backend::for_kind(kind),
            None => return report.stop(SwapError::NotFound(identifier.to_string())),
        };
        let Some(backend) = backend else {
            report
                .notes
                .push(format!("{}: partitions are not resized", identifier));
            return report.stop(SwapError::NotFound(identifier.to_string()));
        };
        let op = DesiredOperation::Resize {
            target: identifier.to_string(),
            size: size.to_string(),
        };
        match backend.apply(self.host, &op) {
            Ok(outcome) => {
                report.tiers.push(outcome);
                report.status = HybridStatus::Resized;
                report
            }
            Err(e) => report.stop(e),
        }
    }

    /// Removes every zram device and swap file. Partitions are left alone.
    fn replace(&self, report: &mut HybridReport) -> Result<(), SwapError> {
        let existing = report.existing.clone();
        for identifier in existing.compressed_memory.iter().chain(&existing.file_backed) {
            let kind = existing.kind_of(identifier).unwrap_or(SwapKind::Other);
            let Some(backend) = Backend::for_kind(kind) else {
                continue;
            };
            let outcome = backend.apply(
                self.host,
                &DesiredOperation::Remove {
                    target: identifier.clone(),
                },
            )?;
            report.removed.push(outcome);
        }
        for identifier in &existing.other {
            report
                .notes
                .push(format!("{}: kept, partitions are not replaced", identifier));
        }
        Ok(())
    }

    fn default_path(&self) -> String {
        self.host.paths().default_swapfile.to_string_lossy().into_owned()
    }

    /// Swap file path for the file tier. An explicit path must not be live;
    /// the default path gains a numeric suffix while it is occupied.
    fn file_path(&self, requested: Option<&str>) -> Result<String, SwapError> {
        if let Some(path) = requested {
            if self.host.probe().is_active(path) {
                return Err(SwapError::AlreadyActive(path.to_string()));
            }
            return Ok(path.to_string());
        }
        let base = self.default_path();
        if !self.is_occupied(&base)? {
            return Ok(base);
        }
        let mut suffix = 2u32;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !self.is_occupied(&candidate)? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    fn is_occupied(&self, path: &str) -> Result<bool, SwapError> {
        Ok(self.host.probe().is_active(path)
            || self.host.fstab().entry_for(path)?.is_some()
            || self.host.fs().exists(std::path::Path::new(path)))
    }
}
