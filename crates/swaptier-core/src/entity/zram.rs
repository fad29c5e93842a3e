//! Compressed-memory (zram) swap lifecycle.
//!
//! Devices are found or allocated through the control utility. When that
//! utility is missing, the size attribute of the first device is written
//! directly; no other device is addressed that way.
//!
//! Persistence goes through zram-generator sections rather than the mount
//! table. A host without the generator keeps runtime-only devices.

use tracing::{info, warn};

use super::{
    Deactivation, EntityState, Outcome, Persistence, RuntimeChange, RuntimeFailure, ZramState,
    activate, deactivate, reactivate_with_priority,
};
use crate::config::GeneratorSize;
use crate::config::generator::{GeneratorSection, device_name, setup_unit};
use crate::error::SwapError;
use crate::exec::{CommandExecutor, Operation, best_effort};
use crate::fmt::{FmtStyle, format_bytes, format_priority};
use crate::fs::FileSystem;
use crate::host::Host;
use crate::size::{parse_size, to_mib};

/// Device whose size attribute may be written directly.
const DEFAULT_DEVICE: &str = "zram0";

fn state(s: ZramState) -> EntityState {
    EntityState::Zram(s)
}

/// `/dev/zram0` for `zram0` or `/dev/zram0`.
pub fn device_path(device: &str) -> String {
    format!("/dev/{}", device_name(device))
}

/// Operations on zram devices.
pub struct ZramSwap<'h, F: FileSystem, E: CommandExecutor> {
    host: &'h Host<F, E>,
}

impl<'h, F: FileSystem, E: CommandExecutor> ZramSwap<'h, F, E> {
    pub fn new(host: &'h Host<F, E>) -> Self {
        Self { host }
    }

    /// Loads the module, allocates and activates a device and optionally
    /// writes its generator section.
    ///
    /// `target` is a preference: the control utility hands out the first
    /// free device, and the outcome carries the one actually used.
    pub fn create(
        &self,
        target: Option<&str>,
        size: &str,
        priority: Option<i32>,
        persist: bool,
    ) -> Result<Outcome, SwapError> {
        let bytes = parse_size(size)?;
        if let Some(t) = target {
            let dev = device_path(t);
            if self.host.probe().is_active(&dev) {
                return Err(SwapError::AlreadyActive(dev));
            }
        }
        info!(
            "zram: creating {} device (priority {})",
            format_bytes(bytes, FmtStyle::Detail),
            format_priority(priority)
        );

        self.ensure_module()?;
        let device = self.allocate_device(target, bytes, ZramState::ModuleLoaded)?;
        self.format(&device)?;
        activate(self.host, &device, priority).map_err(|detail| {
            SwapError::ActivationFailure {
                identifier: device.clone(),
                reached: state(ZramState::Formatted),
                detail,
            }
        })?;

        let mut outcome = Outcome::new(device.as_str(), state(ZramState::Active));
        if let Some(t) = target {
            if device_path(t) != device {
                outcome.note(format!("{} was busy; allocated {}", device_path(t), device));
            }
        }
        if persist {
            self.persist(&mut outcome, bytes, priority);
        }
        Ok(outcome)
    }

    /// Resets and reallocates a device at a new size, keeping its priority.
    /// The device may come back under a different name; the outcome
    /// identifier is authoritative.
    pub fn resize(&self, target: &str, size: &str) -> Result<Outcome, SwapError> {
        let bytes = parse_size(size)?;
        let device = device_path(target);
        let exists = self
            .host
            .fs()
            .exists(&self.host.paths().sys_block.join(device_name(target)));
        if !exists && !self.host.probe().is_active(&device) {
            return Err(SwapError::NotFound(device));
        }

        let old = self.host.resolver().resolve(&device);
        let had_section = self.host.generator().section(&device).is_some();
        let priority = old.for_activation();
        info!(
            "{}: resizing to {} (priority {})",
            device,
            format_bytes(bytes, FmtStyle::Detail),
            format_priority(priority)
        );

        match deactivate(self.host, &device) {
            Deactivation::Done | Deactivation::NotActive => {}
            Deactivation::Unavailable(detail) | Deactivation::Failed(detail) => {
                return Err(SwapError::DeactivationFailure {
                    identifier: device,
                    reached: state(ZramState::Active),
                    detail,
                });
            }
        }

        let reset = self.host.run(&Operation::ResetZram {
            device: device.clone(),
        });
        if !reset.is_success() {
            return Err(SwapError::AllocationFailure {
                identifier: device,
                reached: state(ZramState::Formatted),
                detail: format!("reset failed: {}", reset.diagnostic()),
            });
        }

        let resized = self.allocate_device(Some(&device), bytes, ZramState::ModuleLoaded)?;
        self.format(&resized)?;
        activate(self.host, &resized, priority).map_err(|detail| {
            SwapError::ActivationFailure {
                identifier: resized.clone(),
                reached: state(ZramState::Formatted),
                detail,
            }
        })?;

        let mut outcome = Outcome::new(resized.as_str(), state(ZramState::Active));
        outcome.note(format!("priority preserved: {}", format_priority(priority)));
        if resized != device {
            warn!("{}: reallocated as {}", device, resized);
            outcome.note(format!("device changed from {} to {}", device, resized));
        }
        if had_section {
            if resized != device {
                if let Err(e) = self.host.generator().remove(&device) {
                    warn!("{}: stale generator section left: {}", device, e);
                    outcome.note(format!("stale generator section for {} left: {}", device, e));
                }
            }
            self.persist(&mut outcome, bytes, priority);
        }
        Ok(outcome)
    }

    /// Disables the setup unit, deactivates and frees the device, unloads
    /// the module when no other device uses it and drops the generator
    /// section. Removing an absent device succeeds.
    pub fn remove(&self, target: &str) -> Result<Outcome, SwapError> {
        let device = device_path(target);
        let generator = self.host.generator();
        let mut outcome = Outcome::new(device.as_str(), state(ZramState::Absent));

        if generator.section(&device).is_some() {
            let disable = Operation::DisableService {
                unit: setup_unit(&device),
            };
            if let Some(note) = best_effort(self.host.executor(), &disable) {
                outcome.note(note);
            }
        }

        match deactivate(self.host, &device) {
            Deactivation::Done | Deactivation::NotActive => {}
            Deactivation::Unavailable(detail) => {
                warn!("{}: cannot deactivate ({}); continuing", device, detail);
                outcome.note(format!("deactivation unavailable: {}", detail));
            }
            Deactivation::Failed(detail) => {
                return Err(SwapError::DeactivationFailure {
                    identifier: device,
                    reached: state(ZramState::Active),
                    detail,
                });
            }
        }

        let sysfs = self.host.paths().sys_block.join(device_name(&device));
        if self.host.fs().exists(&sysfs) {
            let reset = Operation::ResetZram {
                device: device.clone(),
            };
            if let Some(note) = best_effort(self.host.executor(), &reset) {
                outcome.note(note);
            }
        }

        let others = self.host.probe().classify().compressed_memory;
        if others.is_empty() {
            if let Some(note) = best_effort(self.host.executor(), &Operation::UnloadZramModule) {
                outcome.note(note);
            }
        } else {
            info!("zram: module kept for {}", others.join(", "));
        }

        outcome.persistence = match generator.remove(&device) {
            Ok(removed) => {
                if removed {
                    if let Some(note) =
                        best_effort(self.host.executor(), &Operation::ReloadServiceConfig)
                    {
                        outcome.note(note);
                    }
                }
                Persistence::Removed
            }
            Err(e) => {
                warn!("{}: generator section left in place: {}", device, e);
                Persistence::Degraded(format!("generator section left in place: {}", e))
            }
        };
        info!("{}: removed", device);
        Ok(outcome)
    }

    /// Changes the live priority and the generator section's priority.
    pub fn reprioritize(&self, target: &str, priority: i32) -> Result<Outcome, SwapError> {
        let device = device_path(target);
        if !self.host.probe().is_active(&device) {
            return Err(SwapError::NotFound(device));
        }

        let mut outcome = Outcome::new(device.as_str(), state(ZramState::Active));
        match reactivate_with_priority(self.host, &device, priority) {
            Ok(RuntimeChange::Applied) => {}
            Ok(RuntimeChange::Skipped(detail)) => {
                outcome.note(format!("live priority unchanged: {}", detail));
            }
            Err(RuntimeFailure::Deactivate(detail)) => {
                return Err(SwapError::DeactivationFailure {
                    identifier: device,
                    reached: state(ZramState::Active),
                    detail,
                });
            }
            Err(RuntimeFailure::Activate(detail)) => {
                return Err(SwapError::ActivationFailure {
                    identifier: device,
                    reached: state(ZramState::Formatted),
                    detail,
                });
            }
        }
        outcome.note("zram priority persists through the zram generator, not the mount table");

        let generator = self.host.generator();
        outcome.persistence = match generator.section(&device) {
            Some(mut section) => {
                section.priority = Some(priority);
                match generator.upsert(section) {
                    Ok(()) => {
                        outcome.state = state(ZramState::GeneratorPersisted);
                        self.reload(&mut outcome)
                    }
                    Err(e) => Persistence::Degraded(format!("generator not updated: {}", e)),
                }
            }
            None => Persistence::Degraded("no generator section; change is runtime-only".into()),
        };
        Ok(outcome)
    }

    /// Loads the module. A failed load is tolerated when the first device
    /// already exists (module built in or loaded earlier).
    fn ensure_module(&self) -> Result<(), SwapError> {
        let load = self.host.run(&Operation::LoadZramModule);
        if load.is_success() {
            return Ok(());
        }
        let first = self.host.paths().sys_block.join(DEFAULT_DEVICE);
        if self.host.fs().exists(&first) {
            warn!("zram: module load failed ({}); device present", load.diagnostic());
            return Ok(());
        }
        Err(SwapError::AllocationFailure {
            identifier: device_path(DEFAULT_DEVICE),
            reached: state(ZramState::Absent),
            detail: format!("cannot load zram module: {}", load.diagnostic()),
        })
    }

    /// Allocates a device of `bytes` and returns its path.
    fn allocate_device(
        &self,
        requested: Option<&str>,
        bytes: u64,
        reached: ZramState,
    ) -> Result<String, SwapError> {
        let wanted = device_path(requested.unwrap_or(DEFAULT_DEVICE));
        let fail = |detail: String| SwapError::AllocationFailure {
            identifier: wanted.clone(),
            reached: state(reached),
            detail,
        };

        let found = self.host.run(&Operation::FindOrAllocateZram { bytes });
        if found.is_success() {
            let name = found.stdout.trim();
            if name.is_empty() {
                return Err(fail("control utility returned no device".to_string()));
            }
            return Ok(device_path(name));
        }
        if !found.is_unavailable() {
            return Err(fail(found.diagnostic()));
        }

        if device_name(&wanted) != DEFAULT_DEVICE {
            return Err(SwapError::UnsupportedFallback {
                identifier: wanted.clone(),
                detail: format!(
                    "{}; direct size write only addresses {}",
                    found.diagnostic(),
                    DEFAULT_DEVICE
                ),
            });
        }
        warn!(
            "{}: {}; writing size attribute directly",
            wanted,
            found.diagnostic()
        );
        let write = self.host.run(&Operation::WriteZramSize {
            device: wanted.clone(),
            bytes,
        });
        if !write.is_success() {
            return Err(fail(write.diagnostic()));
        }
        Ok(wanted)
    }

    fn format(&self, device: &str) -> Result<(), SwapError> {
        let mkswap = self.host.run(&Operation::WriteSwapHeader {
            target: device.to_string(),
        });
        if mkswap.is_success() {
            return Ok(());
        }
        Err(SwapError::FormatFailure {
            identifier: device.to_string(),
            reached: state(ZramState::DeviceAllocated),
            detail: mkswap.diagnostic(),
        })
    }

    fn persist(&self, outcome: &mut Outcome, bytes: u64, priority: Option<i32>) {
        let generator = self.host.generator();
        if !generator.is_available() {
            info!("{}: zram-generator not installed; runtime only", outcome.identifier);
            outcome.persistence =
                Persistence::Degraded("zram-generator not installed; runtime only".to_string());
            return;
        }
        let section = GeneratorSection {
            device: device_name(&outcome.identifier).to_string(),
            size: Some(GeneratorSize::Mib(to_mib(bytes))),
            priority,
            extra: Vec::new(),
        };
        outcome.persistence = match generator.upsert(section) {
            Ok(()) => {
                outcome.state = state(ZramState::GeneratorPersisted);
                self.reload(outcome)
            }
            Err(e) => {
                warn!("{}: generator not updated: {}", outcome.identifier, e);
                Persistence::Degraded(format!("generator not updated: {}", e))
            }
        };
    }

    fn reload(&self, outcome: &mut Outcome) -> Persistence {
        match best_effort(self.host.executor(), &Operation::ReloadServiceConfig) {
            None => Persistence::Durable,
            Some(note) => {
                outcome.note(note.clone());
                Persistence::Degraded(note)
            }
        }
    }
}
