//! File-backed swap lifecycle.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{
    Deactivation, EntityState, FileState, Outcome, Persistence, RuntimeChange, RuntimeFailure,
    activate, deactivate, reactivate_with_priority,
};
use crate::error::SwapError;
use crate::exec::{CommandExecutor, Operation};
use crate::fmt::{FmtStyle, format_bytes, format_priority};
use crate::fs::FileSystem;
use crate::host::Host;
use crate::probe::{SwapKind, ZRAM_MARKER};
use crate::size::{parse_size, to_mib};

/// Operations on swap files.
pub struct FileSwap<'h, F: FileSystem, E: CommandExecutor> {
    host: &'h Host<F, E>,
}

fn state(s: FileState) -> EntityState {
    EntityState::File(s)
}

/// Sibling path a resized file is built at before it replaces the original.
fn staging_path(path: &str) -> String {
    format!("{}.swaptier-new", path)
}

impl<'h, F: FileSystem, E: CommandExecutor> FileSwap<'h, F, E> {
    pub fn new(host: &'h Host<F, E>) -> Self {
        Self { host }
    }

    /// Allocates, formats and activates a swap file, then optionally
    /// persists it with `pri=<priority>`.
    pub fn create(
        &self,
        path: &str,
        size: &str,
        priority: Option<i32>,
        persist: bool,
    ) -> Result<Outcome, SwapError> {
        let bytes = parse_size(size)?;
        if self.host.probe().is_active(path) {
            return Err(SwapError::AlreadyActive(path.to_string()));
        }
        info!("{}: creating {} swap file", path, format_bytes(bytes, FmtStyle::Detail));

        let prior = if self.host.fs().exists(Path::new(path)) {
            FileState::Allocated
        } else {
            FileState::Absent
        };
        self.allocate(path, bytes, prior)?;
        self.format(path, path, FileState::Allocated)?;
        activate(self.host, path, priority).map_err(|detail| SwapError::ActivationFailure {
            identifier: path.to_string(),
            reached: state(FileState::Formatted),
            detail,
        })?;

        let mut outcome = Outcome::new(path, state(FileState::Active));
        if persist {
            self.persist(&mut outcome, priority);
        }
        Ok(outcome)
    }

    /// Resizes a swap file, keeping the priority it had before.
    ///
    /// The replacement is built and formatted beside the original and moved
    /// over it only then, so a failed step leaves the original formatted and
    /// inactive. A persisted entry whose file is missing is enough to
    /// rebuild it.
    pub fn resize(&self, path: &str, size: &str) -> Result<Outcome, SwapError> {
        let bytes = parse_size(size)?;
        let was_persisted = self.host.fstab().entry_for(path)?.is_some();
        let probe = self.host.probe();
        if !was_persisted && !self.host.fs().exists(Path::new(path)) && !probe.is_active(path) {
            return Err(SwapError::NotFound(path.to_string()));
        }

        // Must be read before deactivation: an unpersisted live priority is
        // gone once the resource is offline.
        let old = self.host.resolver().resolve(path);
        let priority = old.for_activation();
        info!(
            "{}: resizing to {} (priority {})",
            path,
            format_bytes(bytes, FmtStyle::Detail),
            format_priority(priority)
        );

        match deactivate(self.host, path) {
            Deactivation::Done | Deactivation::NotActive => {}
            Deactivation::Unavailable(detail) | Deactivation::Failed(detail) => {
                return Err(SwapError::DeactivationFailure {
                    identifier: path.to_string(),
                    reached: state(FileState::Active),
                    detail,
                });
            }
        }

        let staging = staging_path(path);
        if let Err(e) = self.rebuild(path, &staging, bytes) {
            self.discard(&staging);
            return Err(e);
        }
        activate(self.host, path, priority).map_err(|detail| SwapError::ActivationFailure {
            identifier: path.to_string(),
            reached: state(FileState::Formatted),
            detail,
        })?;

        let mut outcome = Outcome::new(path, state(FileState::Active));
        outcome.note(format!("priority preserved: {}", format_priority(priority)));
        if was_persisted {
            self.persist(&mut outcome, priority);
        }
        Ok(outcome)
    }

    /// Deactivates, unpersists and deletes a swap file. Removing an absent
    /// file succeeds.
    pub fn remove(&self, path: &str) -> Result<Outcome, SwapError> {
        let mut outcome = Outcome::new(path, state(FileState::Absent));

        match deactivate(self.host, path) {
            Deactivation::Done | Deactivation::NotActive => {}
            Deactivation::Unavailable(detail) => {
                warn!("{}: cannot deactivate ({}); continuing", path, detail);
                outcome.note(format!("deactivation unavailable: {}", detail));
            }
            Deactivation::Failed(detail) => {
                return Err(SwapError::DeactivationFailure {
                    identifier: path.to_string(),
                    reached: state(FileState::Active),
                    detail,
                });
            }
        }

        outcome.persistence = match self.host.fstab().remove(path) {
            Ok(_) => Persistence::Removed,
            Err(e) => {
                warn!("{}: could not strip persisted entry: {}", path, e);
                Persistence::Degraded(format!("persisted entry left in place: {}", e))
            }
        };

        let rm = self.host.run(&Operation::RemoveFile {
            path: PathBuf::from(path),
        });
        if !rm.is_success() {
            warn!("{}: file not deleted: {}", path, rm.diagnostic());
            outcome.state = state(FileState::Formatted);
            outcome.note(format!("file left in place: {}", rm.diagnostic()));
        } else {
            info!("{}: removed", path);
        }
        Ok(outcome)
    }

    /// Changes the priority of a live resource and rewrites its persisted
    /// entry. zram devices are persisted through the generator instead.
    pub fn reprioritize(&self, identifier: &str, priority: i32) -> Result<Outcome, SwapError> {
        let is_zram = identifier.contains(ZRAM_MARKER);
        let live = self.host.probe().find(identifier);

        let mut outcome = Outcome::new(identifier, state(FileState::Active));
        match live {
            Some(_) => match reactivate_with_priority(self.host, identifier, priority) {
                Ok(RuntimeChange::Applied) => {}
                Ok(RuntimeChange::Skipped(detail)) => {
                    outcome.note(format!("live priority unchanged: {}", detail));
                }
                Err(RuntimeFailure::Deactivate(detail)) => {
                    return Err(SwapError::DeactivationFailure {
                        identifier: identifier.to_string(),
                        reached: state(FileState::Active),
                        detail,
                    });
                }
                Err(RuntimeFailure::Activate(detail)) => {
                    return Err(SwapError::ActivationFailure {
                        identifier: identifier.to_string(),
                        reached: state(FileState::Formatted),
                        detail,
                    });
                }
            },
            None => {
                let persisted = self.host.fstab().entry_for(identifier)?;
                if is_zram || persisted.is_none() {
                    return Err(SwapError::NotFound(identifier.to_string()));
                }
                outcome.state = state(FileState::Formatted);
                outcome.note("not active; only the persisted priority changes");
            }
        }

        if is_zram {
            let reason = format!(
                "{} priority persists through the zram generator, not the mount table",
                SwapKind::CompressedMemory
            );
            outcome.note(reason.clone());
            outcome.persistence = Persistence::Degraded(reason);
        } else {
            self.persist(&mut outcome, Some(priority));
        }
        Ok(outcome)
    }

    /// Removes any file at `path`, then allocates and formats a fresh one.
    fn allocate(&self, path: &str, bytes: u64, prior: FileState) -> Result<(), SwapError> {
        if self.host.fs().exists(Path::new(path)) {
            let rm = self.host.run(&Operation::RemoveFile {
                path: PathBuf::from(path),
            });
            if !rm.is_success() {
                return Err(SwapError::AllocationFailure {
                    identifier: path.to_string(),
                    reached: state(prior),
                    detail: format!("cannot replace file: {}", rm.diagnostic()),
                });
            }
        }
        self.fill(path, path, bytes, FileState::Absent)
    }

    /// Builds a formatted file of `bytes` at `staging` and moves it over
    /// `path`. Errors report the state `path` is left in.
    fn rebuild(&self, path: &str, staging: &str, bytes: u64) -> Result<(), SwapError> {
        let kept = if self.host.fs().exists(Path::new(path)) {
            FileState::Formatted
        } else {
            FileState::Absent
        };
        self.discard(staging);
        self.fill(path, staging, bytes, kept)?;
        self.format(path, staging, kept)?;

        let mv = self.host.run(&Operation::RenameFile {
            from: PathBuf::from(staging),
            to: PathBuf::from(path),
        });
        if !mv.is_success() {
            return Err(SwapError::AllocationFailure {
                identifier: path.to_string(),
                reached: state(kept),
                detail: format!("cannot replace file: {}", mv.diagnostic()),
            });
        }
        Ok(())
    }

    /// Best-effort removal of a leftover staging file.
    fn discard(&self, staging: &str) {
        if !self.host.fs().exists(Path::new(staging)) {
            return;
        }
        let rm = self.host.run(&Operation::RemoveFile {
            path: PathBuf::from(staging),
        });
        if !rm.is_success() {
            warn!("{}: left in place: {}", staging, rm.diagnostic());
        }
    }

    /// Allocates `bytes` at `target` with the fast strategy, falling back to
    /// zero-fill. Failures are reported against `identifier` at `reached`.
    fn fill(
        &self,
        identifier: &str,
        target: &str,
        bytes: u64,
        reached: FileState,
    ) -> Result<(), SwapError> {
        let target_buf = PathBuf::from(target);
        let fail = |detail: String| SwapError::AllocationFailure {
            identifier: identifier.to_string(),
            reached: state(reached),
            detail,
        };

        let fast = self.host.run(&Operation::AllocateFast {
            path: target_buf.clone(),
            bytes,
        });
        if fast.is_success() {
            return Ok(());
        }
        warn!(
            "{}: fast allocation failed ({}); falling back to zero-fill",
            target,
            fast.diagnostic()
        );

        let mib = to_mib(bytes);
        if mib == 0 {
            return Err(fail(format!(
                "{}; zero-fill needs at least 1 MiB",
                fast.diagnostic()
            )));
        }
        let slow = self.host.run(&Operation::AllocateZeroFill {
            path: target_buf,
            mib,
        });
        if slow.is_success() {
            return Ok(());
        }
        Err(fail(format!("{}; {}", fast.diagnostic(), slow.diagnostic())))
    }

    /// Restricts access to `target` and writes the swap header.
    fn format(&self, identifier: &str, target: &str, reached: FileState) -> Result<(), SwapError> {
        let fail = |detail: String| SwapError::FormatFailure {
            identifier: identifier.to_string(),
            reached: state(reached),
            detail,
        };
        let chmod = self.host.run(&Operation::RestrictAccess {
            path: PathBuf::from(target),
        });
        if !chmod.is_success() {
            return Err(fail(format!("cannot restrict access: {}", chmod.diagnostic())));
        }
        let mkswap = self.host.run(&Operation::WriteSwapHeader {
            target: target.to_string(),
        });
        if !mkswap.is_success() {
            return Err(fail(mkswap.diagnostic()));
        }
        Ok(())
    }

    fn persist(&self, outcome: &mut Outcome, priority: Option<i32>) {
        match self.host.fstab().replace(&outcome.identifier, priority) {
            Ok(()) => {
                outcome.persistence = Persistence::Durable;
                if outcome.state == state(FileState::Active) {
                    outcome.state = state(FileState::Persisted);
                }
            }
            Err(e) => {
                warn!("{}: runtime change kept, not persisted: {}", outcome.identifier, e);
                outcome.persistence = Persistence::Degraded(format!("mount table not updated: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{MockExecutor, OperationKind};
    use crate::host::testing::mock_host;
    use crate::size::{GIB, MIB};

    #[test]
    fn test_create_persists_once() {
        let (host, exec) = mock_host(MockExecutor::new());
        let swap = FileSwap::new(&host);

        let outcome = swap.create("/swapfile", "8G", Some(-1), true).unwrap();
        assert_eq!(outcome.state, state(FileState::Persisted));
        assert_eq!(outcome.persistence, Persistence::Durable);

        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.capacity_bytes, 8 * GIB);
        assert_eq!(live.priority, -1);
        assert_eq!(
            exec.fs().contents("/etc/fstab").unwrap(),
            "/swapfile none swap defaults,pri=-1 0 0\n"
        );
    }

    #[test]
    fn test_create_operation_order() {
        let (host, exec) = mock_host(MockExecutor::new());
        FileSwap::new(&host)
            .create("/swapfile", "1G", Some(5), false)
            .unwrap();
        assert_eq!(
            exec.kinds(),
            vec![
                OperationKind::AllocateFast,
                OperationKind::RestrictAccess,
                OperationKind::WriteSwapHeader,
                OperationKind::ActivateLong,
            ]
        );
        assert!(!exec.fs().exists(std::path::Path::new("/etc/fstab")));
    }

    #[test]
    fn test_create_falls_back_to_zero_fill() {
        let (host, exec) = mock_host(MockExecutor::new());
        exec.fail_on(OperationKind::AllocateFast);

        FileSwap::new(&host)
            .create("/swapfile", "1.5G", None, false)
            .unwrap();
        assert_eq!(exec.file_size("/swapfile"), Some(1536 * MIB));
        assert!(
            exec.operations()
                .contains(&Operation::AllocateZeroFill {
                    path: PathBuf::from("/swapfile"),
                    mib: 1536,
                })
        );
    }

    #[test]
    fn test_create_allocation_failure_stops_before_format() {
        let (host, exec) = mock_host(MockExecutor::new());
        exec.fail_on(OperationKind::AllocateFast);
        exec.fail_on(OperationKind::AllocateZeroFill);

        let err = FileSwap::new(&host)
            .create("/swapfile", "1G", None, true)
            .unwrap_err();
        assert!(matches!(err, SwapError::AllocationFailure { .. }));
        assert_eq!(err.reached(), Some(state(FileState::Absent)));
        assert!(!exec.kinds().contains(&OperationKind::WriteSwapHeader));
    }

    #[test]
    fn test_create_activation_failure_reports_formatted() {
        let (host, exec) = mock_host(MockExecutor::new());
        exec.fail_on(OperationKind::ActivateLong);
        exec.fail_on(OperationKind::ActivateShort);

        let err = FileSwap::new(&host)
            .create("/swapfile", "1G", Some(3), true)
            .unwrap_err();
        assert!(matches!(err, SwapError::ActivationFailure { .. }));
        assert_eq!(err.reached(), Some(state(FileState::Formatted)));
        assert!(exec.fs().contents("/etc/fstab").is_none());
    }

    #[test]
    fn test_create_invalid_size_has_no_side_effects() {
        let (host, exec) = mock_host(MockExecutor::new());
        let err = FileSwap::new(&host)
            .create("/swapfile", "0G", None, true)
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidSize(_)));
        assert!(exec.operations().is_empty());
    }

    #[test]
    fn test_create_refuses_active_target() {
        let (host, _exec) = mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, None));
        let err = FileSwap::new(&host)
            .create("/swapfile", "2G", None, true)
            .unwrap_err();
        assert!(matches!(err, SwapError::AlreadyActive(_)));
    }

    #[test]
    fn test_resize_preserves_priority_and_is_idempotent() {
        let (host, exec) = mock_host(MockExecutor::new());
        let swap = FileSwap::new(&host);
        swap.create("/swapfile", "1G", Some(7), true).unwrap();

        for _ in 0..2 {
            let outcome = swap.resize("/swapfile", "4G").unwrap();
            assert_eq!(outcome.state, state(FileState::Persisted));
            let live = host.probe().find("/swapfile").unwrap();
            assert_eq!(live.priority, 7);
            assert_eq!(live.capacity_bytes, 4 * GIB);
        }
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
        assert_eq!(host.fstab().priority_of("/swapfile"), Some(7));
        assert_eq!(exec.file_size("/swapfile"), Some(4 * GIB));
    }

    #[test]
    fn test_resize_orders_destructive_steps() {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(2)));
        FileSwap::new(&host).resize("/swapfile", "2G").unwrap();
        assert_eq!(
            exec.kinds(),
            vec![
                OperationKind::Deactivate,
                OperationKind::AllocateFast,
                OperationKind::RestrictAccess,
                OperationKind::WriteSwapHeader,
                OperationKind::RenameFile,
                OperationKind::ActivateLong,
            ]
        );
        // Runtime-only resource stays unpersisted.
        assert!(exec.fs().contents("/etc/fstab").is_none());
    }

    #[test]
    fn test_resize_kernel_assigned_priority_activates_without_flag() {
        let (host, exec) = mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, None));
        FileSwap::new(&host).resize("/swapfile", "2G").unwrap();
        assert!(exec.kinds().contains(&OperationKind::ActivatePlain));
    }

    #[test]
    fn test_resize_missing_is_not_found() {
        let (host, exec) = mock_host(MockExecutor::new());
        let err = FileSwap::new(&host).resize("/nope", "1G").unwrap_err();
        assert!(matches!(err, SwapError::NotFound(_)));
        assert!(exec.operations().is_empty());
    }

    #[test]
    fn test_resize_deactivation_failure_aborts() {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(2)));
        exec.fail_on(OperationKind::Deactivate);

        let err = FileSwap::new(&host).resize("/swapfile", "2G").unwrap_err();
        assert_eq!(err.reached(), Some(state(FileState::Active)));
        assert_eq!(exec.file_size("/swapfile"), Some(GIB));
    }

    fn persisted_file(priority: i32) -> (crate::host::testing::MockHost, MockExecutor) {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(priority)));
        exec.fs().add_file(
            "/etc/fstab",
            format!("/swapfile none swap defaults,pri={} 0 0\n", priority),
        );
        (host, exec)
    }

    #[test]
    fn test_resize_allocation_failure_keeps_original() {
        let (host, exec) = persisted_file(7);
        exec.fail_on(OperationKind::AllocateFast);
        exec.fail_on(OperationKind::AllocateZeroFill);
        let swap = FileSwap::new(&host);

        let err = swap.resize("/swapfile", "4G").unwrap_err();
        assert!(matches!(err, SwapError::AllocationFailure { .. }));
        assert_eq!(err.reached(), Some(state(FileState::Formatted)));
        assert_eq!(exec.file_size("/swapfile"), Some(GIB));
        assert!(!host.probe().is_active("/swapfile"));
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
        assert_eq!(host.fstab().priority_of("/swapfile"), Some(7));

        exec.restore(OperationKind::AllocateFast);
        exec.restore(OperationKind::AllocateZeroFill);
        let outcome = swap.resize("/swapfile", "4G").unwrap();
        assert_eq!(outcome.state, state(FileState::Persisted));
        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.capacity_bytes, 4 * GIB);
        assert_eq!(live.priority, 7);
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
    }

    #[test]
    fn test_resize_format_failure_leaves_no_staging_file() {
        let (host, exec) = persisted_file(3);
        exec.fail_on(OperationKind::WriteSwapHeader);

        let err = FileSwap::new(&host).resize("/swapfile", "2G").unwrap_err();
        assert!(matches!(err, SwapError::FormatFailure { .. }));
        assert_eq!(err.reached(), Some(state(FileState::Formatted)));
        assert_eq!(exec.file_size("/swapfile"), Some(GIB));
        assert_eq!(exec.file_size("/swapfile.swaptier-new"), None);
        assert!(!exec.kinds().contains(&OperationKind::RenameFile));

        exec.restore(OperationKind::WriteSwapHeader);
        FileSwap::new(&host).resize("/swapfile", "2G").unwrap();
        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.capacity_bytes, 2 * GIB);
        assert_eq!(live.priority, 3);
    }

    #[test]
    fn test_resize_rebuilds_missing_file_from_persisted_entry() {
        let (host, exec) = mock_host(MockExecutor::new());
        exec.fs()
            .add_file("/etc/fstab", "/swapfile none swap defaults,pri=4 0 0\n");

        let outcome = FileSwap::new(&host).resize("/swapfile", "1G").unwrap();
        assert_eq!(outcome.state, state(FileState::Persisted));
        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.capacity_bytes, GIB);
        assert_eq!(live.priority, 4);
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
    }

    #[test]
    fn test_resize_unreadable_mount_table_changes_nothing() {
        let (host, exec) = persisted_file(2);
        exec.fs().deny_reads("/etc/fstab");

        let err = FileSwap::new(&host).resize("/swapfile", "2G").unwrap_err();
        assert!(matches!(err, SwapError::Io(_)));
        assert!(exec.operations().is_empty());
        assert!(host.probe().is_active("/swapfile"));
    }

    #[test]
    fn test_mixed_sequence_keeps_one_entry() {
        let (host, exec) = mock_host(MockExecutor::new());
        let swap = FileSwap::new(&host);

        swap.create("/swapfile", "1G", Some(5), true).unwrap();
        swap.resize("/swapfile", "2G").unwrap();
        swap.reprioritize("/swapfile", 9).unwrap();
        swap.resize("/swapfile", "3G").unwrap();

        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
        assert_eq!(host.fstab().priority_of("/swapfile"), Some(9));
        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.priority, 9);
        assert_eq!(live.capacity_bytes, 3 * GIB);
        assert_eq!(exec.file_size("/swapfile"), Some(3 * GIB));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(2)));
        exec.fs()
            .add_file("/etc/fstab", "/swapfile none swap defaults,pri=2 0 0\n");
        let swap = FileSwap::new(&host);

        let first = swap.remove("/swapfile").unwrap();
        assert_eq!(first.state, state(FileState::Absent));
        assert_eq!(first.persistence, Persistence::Removed);
        assert!(!host.probe().is_active("/swapfile"));
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 0);
        assert_eq!(exec.file_size("/swapfile"), None);

        let second = swap.remove("/swapfile").unwrap();
        assert_eq!(second.state, state(FileState::Absent));
    }

    #[test]
    fn test_remove_without_deactivation_tool_continues() {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(2)));
        exec.make_unavailable(OperationKind::Deactivate);

        let outcome = FileSwap::new(&host).remove("/swapfile").unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(exec.file_size("/swapfile"), None);
    }

    #[test]
    fn test_reprioritize_rewrites_single_entry() {
        let (host, exec) =
            mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(2)));
        exec.fs().add_file(
            "/etc/fstab",
            "/swapfile none swap defaults 0 0\n/swapfile none swap defaults,pri=1 0 0\n",
        );

        let outcome = FileSwap::new(&host).reprioritize("/swapfile", 50).unwrap();
        assert_eq!(outcome.state, state(FileState::Persisted));
        assert_eq!(host.probe().find("/swapfile").unwrap().priority, 50);
        assert_eq!(host.fstab().count_for("/swapfile").unwrap(), 1);
        assert_eq!(host.fstab().priority_of("/swapfile"), Some(50));
    }

    #[test]
    fn test_reprioritize_zram_skips_mount_table() {
        let (host, exec) = mock_host(MockExecutor::new().with_active_zram(0, GIB, 100));
        let outcome = FileSwap::new(&host).reprioritize("/dev/zram0", 90).unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(host.probe().find("/dev/zram0").unwrap().priority, 90);
        assert!(exec.fs().contents("/etc/fstab").is_none());
    }

    #[test]
    fn test_reprioritize_unknown_is_not_found() {
        let (host, _exec) = mock_host(MockExecutor::new());
        let err = FileSwap::new(&host).reprioritize("/swapfile", 1).unwrap_err();
        assert!(matches!(err, SwapError::NotFound(_)));
    }
}
