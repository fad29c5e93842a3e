//! Simulated host for testing lifecycle operations without root.
//!
//! `MockExecutor` keeps a model of the kernel's swap table, allocated swap
//! files, zram devices and module state, and mirrors the live table into a
//! [`MockFs`] at `/proc/swaps` after every change, so the probe sees the
//! effects of each operation exactly like it would on a real host.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::operation::{CommandExecutor, CommandOutcome, Operation, OperationKind};
use crate::fs::MockFs;
use crate::host::HostPaths;
use crate::size::{KIB, MIB};

#[derive(Debug, Clone)]
struct LiveSwap {
    identifier: String,
    kind: &'static str,
    size_kib: u64,
    used_kib: u64,
    priority: i32,
}

#[derive(Debug)]
struct HostSim {
    swaps: Vec<LiveSwap>,
    files: HashMap<PathBuf, u64>,
    formatted: HashSet<String>,
    module_loaded: bool,
    zram: BTreeMap<u32, u64>,
    next_auto_priority: i32,
    failures: HashSet<OperationKind>,
    unavailable: HashSet<OperationKind>,
    log: Vec<Operation>,
}

impl Default for HostSim {
    fn default() -> Self {
        Self {
            swaps: Vec::new(),
            files: HashMap::new(),
            formatted: HashSet::new(),
            module_loaded: false,
            zram: BTreeMap::new(),
            next_auto_priority: -2,
            failures: HashSet::new(),
            unavailable: HashSet::new(),
            log: Vec::new(),
        }
    }
}

impl HostSim {
    fn is_active(&self, identifier: &str) -> bool {
        self.swaps.iter().any(|s| s.identifier == identifier)
    }
}

fn zram_index(device: &str) -> Option<u32> {
    device
        .strip_prefix("/dev/")
        .unwrap_or(device)
        .strip_prefix("zram")?
        .parse()
        .ok()
}

/// In-memory host simulation implementing [`CommandExecutor`].
#[derive(Debug, Clone)]
pub struct MockExecutor {
    fs: MockFs,
    swaps_path: PathBuf,
    sys_block: PathBuf,
    state: Arc<Mutex<HostSim>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Creates an executor over a fresh [`MockFs`] with the default paths.
    pub fn new() -> Self {
        Self::for_host(MockFs::new(), &HostPaths::default())
    }

    /// Creates an executor that mirrors its state into `fs` at `paths`.
    pub fn for_host(fs: MockFs, paths: &HostPaths) -> Self {
        let exec = Self {
            fs,
            swaps_path: paths.proc_swaps.clone(),
            sys_block: paths.sys_block.clone(),
            state: Arc::new(Mutex::new(HostSim::default())),
        };
        exec.sync(&exec.lock());
        exec
    }

    /// Filesystem handle shared with this executor.
    pub fn fs(&self) -> MockFs {
        self.fs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostSim> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every operation of `kind` fail with exit code 1.
    pub fn fail_on(&self, kind: OperationKind) {
        self.lock().failures.insert(kind);
    }

    /// Makes every operation of `kind` report a missing tool.
    pub fn make_unavailable(&self, kind: OperationKind) {
        self.lock().unavailable.insert(kind);
    }

    /// Clears injected failures and unavailability for `kind`.
    pub fn restore(&self, kind: OperationKind) {
        let mut state = self.lock();
        state.failures.remove(&kind);
        state.unavailable.remove(&kind);
    }

    /// Seeds an active, formatted swap file.
    pub fn with_active_file(self, path: &str, bytes: u64, priority: Option<i32>) -> Self {
        {
            let mut state = self.lock();
            state.files.insert(PathBuf::from(path), bytes);
            state.formatted.insert(path.to_string());
            let priority = priority.unwrap_or_else(|| next_auto(&mut state));
            state.swaps.push(LiveSwap {
                identifier: path.to_string(),
                kind: "file",
                size_kib: bytes / KIB,
                used_kib: 0,
                priority,
            });
            self.fs.add_file(path, "");
            self.sync(&state);
        }
        self
    }

    /// Seeds an active, formatted zram device (loads the module).
    pub fn with_active_zram(self, index: u32, bytes: u64, priority: i32) -> Self {
        {
            let mut state = self.lock();
            state.module_loaded = true;
            state.zram.insert(index, bytes);
            let device = format!("/dev/zram{}", index);
            state.formatted.insert(device.clone());
            state.swaps.push(LiveSwap {
                identifier: device,
                kind: "partition",
                size_kib: bytes / KIB,
                used_kib: 0,
                priority,
            });
            self.sync(&state);
        }
        self
    }

    /// Seeds an active swap partition.
    pub fn with_active_partition(self, device: &str, bytes: u64, priority: i32) -> Self {
        {
            let mut state = self.lock();
            state.formatted.insert(device.to_string());
            state.swaps.push(LiveSwap {
                identifier: device.to_string(),
                kind: "partition",
                size_kib: bytes / KIB,
                used_kib: 0,
                priority,
            });
            self.sync(&state);
        }
        self
    }

    /// Every operation executed so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().log.clone()
    }

    /// Kinds of every operation executed so far, in order.
    pub fn kinds(&self) -> Vec<OperationKind> {
        self.lock().log.iter().map(Operation::kind).collect()
    }

    /// Allocated size of a swap file, if it exists.
    pub fn file_size(&self, path: &str) -> Option<u64> {
        self.lock().files.get(Path::new(path)).copied()
    }

    /// Current disksize of a zram device, if it exists.
    pub fn zram_disksize(&self, index: u32) -> Option<u64> {
        self.lock().zram.get(&index).copied()
    }

    pub fn module_loaded(&self) -> bool {
        self.lock().module_loaded
    }

    fn sync(&self, state: &HostSim) {
        let mut table = String::from("Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority\n");
        for swap in &state.swaps {
            table.push_str(&format!(
                "{:<40}{}\t\t{}\t\t{}\t\t{}\n",
                swap.identifier, swap.kind, swap.size_kib, swap.used_kib, swap.priority
            ));
        }
        self.fs.add_file(&self.swaps_path, table);

        if let Ok(entries) = crate::fs::FileSystem::read_dir(&self.fs, &self.sys_block) {
            for entry in entries {
                let is_zram = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(zram_index)
                    .is_some();
                if is_zram {
                    self.fs.remove(entry.join("disksize"));
                    self.fs.remove(&entry);
                }
            }
        }
        for (index, size) in &state.zram {
            self.fs.add_file(
                self.sys_block.join(format!("zram{}", index)).join("disksize"),
                size.to_string(),
            );
        }
    }

    fn apply(&self, state: &mut HostSim, op: &Operation) -> CommandOutcome {
        match op {
            Operation::QueryLive => {
                let table = self.fs.contents(&self.swaps_path).unwrap_or_default();
                CommandOutcome::success(table)
            }
            Operation::AllocateFast { path, bytes } => self.allocate(state, path, *bytes),
            Operation::AllocateZeroFill { path, mib } => self.allocate(state, path, mib * MIB),
            Operation::RestrictAccess { path } => {
                if state.files.contains_key(path) {
                    CommandOutcome::success("")
                } else {
                    CommandOutcome::failed(1, "chmod: No such file or directory")
                }
            }
            Operation::WriteSwapHeader { target } => {
                if state.is_active(target) {
                    return CommandOutcome::failed(1, "mkswap: device is in use");
                }
                let ready = match zram_index(target) {
                    Some(index) => state.zram.get(&index).is_some_and(|size| *size > 0),
                    None => state.files.contains_key(Path::new(target)),
                };
                if !ready {
                    return CommandOutcome::failed(1, "mkswap: cannot open target");
                }
                state.formatted.insert(target.clone());
                CommandOutcome::success("")
            }
            Operation::Activate {
                target, priority, ..
            } => {
                if state.is_active(target) {
                    return CommandOutcome::failed(255, "swapon: Device or resource busy");
                }
                if !state.formatted.contains(target) {
                    return CommandOutcome::failed(255, "swapon: read swap header failed");
                }
                let (kind, bytes) = match zram_index(target) {
                    Some(index) => ("partition", state.zram.get(&index).copied().unwrap_or(0)),
                    None => (
                        "file",
                        state.files.get(Path::new(target)).copied().unwrap_or(0),
                    ),
                };
                let priority = priority.unwrap_or_else(|| next_auto(state));
                state.swaps.push(LiveSwap {
                    identifier: target.clone(),
                    kind,
                    size_kib: bytes / KIB,
                    used_kib: 0,
                    priority,
                });
                CommandOutcome::success("")
            }
            Operation::Deactivate { target } => {
                if !state.is_active(target) {
                    return CommandOutcome::failed(255, "swapoff: Invalid argument");
                }
                state.swaps.retain(|s| &s.identifier != target);
                CommandOutcome::success("")
            }
            Operation::FindOrAllocateZram { bytes } => {
                if !state.module_loaded {
                    return CommandOutcome::failed(1, "zramctl: no free zram device found");
                }
                let index = state
                    .zram
                    .iter()
                    .find(|(_, size)| **size == 0)
                    .map(|(index, _)| *index)
                    .unwrap_or_else(|| state.zram.keys().max().map_or(0, |max| max + 1));
                state.zram.insert(index, *bytes);
                CommandOutcome::success(format!("/dev/zram{}\n", index))
            }
            Operation::ResetZram { device } => {
                if state.is_active(device) {
                    return CommandOutcome::failed(1, "zramctl: Device or resource busy");
                }
                match zram_index(device).and_then(|i| state.zram.get_mut(&i)) {
                    Some(size) => {
                        *size = 0;
                        state.formatted.remove(device);
                        CommandOutcome::success("")
                    }
                    None => CommandOutcome::failed(1, "zramctl: no such device"),
                }
            }
            Operation::WriteZramSize { device, bytes } => {
                if !state.module_loaded {
                    return CommandOutcome::failed(1, "tee: No such file or directory");
                }
                match zram_index(device).and_then(|i| state.zram.get_mut(&i)) {
                    Some(size) if *size == 0 => {
                        *size = *bytes;
                        CommandOutcome::success(bytes.to_string())
                    }
                    Some(_) => CommandOutcome::failed(1, "tee: Device or resource busy"),
                    None => CommandOutcome::failed(1, "tee: No such file or directory"),
                }
            }
            Operation::LoadZramModule => {
                state.module_loaded = true;
                state.zram.entry(0).or_insert(0);
                CommandOutcome::success("")
            }
            Operation::UnloadZramModule => {
                let in_use = state.swaps.iter().any(|s| zram_index(&s.identifier).is_some());
                if in_use {
                    return CommandOutcome::failed(1, "modprobe: FATAL: Module zram is in use.");
                }
                state.module_loaded = false;
                state.zram.clear();
                CommandOutcome::success("")
            }
            Operation::ReloadServiceConfig | Operation::DisableService { .. } => {
                CommandOutcome::success("")
            }
            Operation::RemoveFile { path } => {
                state.files.remove(path);
                state.formatted.remove(&*path.to_string_lossy());
                self.fs.remove(path);
                CommandOutcome::success("")
            }
            Operation::RenameFile { from, to } => {
                if state.is_active(&*to.to_string_lossy()) {
                    return CommandOutcome::failed(1, "mv: Text file busy");
                }
                let Some(bytes) = state.files.remove(from) else {
                    return CommandOutcome::failed(1, "mv: cannot stat source");
                };
                state.files.insert(to.clone(), bytes);
                let header = state.formatted.remove(&*from.to_string_lossy());
                state.formatted.remove(&*to.to_string_lossy());
                if header {
                    state.formatted.insert(to.to_string_lossy().into_owned());
                }
                self.fs.remove(from);
                self.fs.add_file(to, "");
                CommandOutcome::success("")
            }
            Operation::WriteFile { path, contents } => {
                self.fs.add_file(path, contents.clone());
                CommandOutcome::success(contents.clone())
            }
        }
    }

    fn allocate(&self, state: &mut HostSim, path: &Path, bytes: u64) -> CommandOutcome {
        if state.is_active(&*path.to_string_lossy()) {
            return CommandOutcome::failed(1, "Text file busy");
        }
        if bytes == 0 {
            return CommandOutcome::failed(1, "invalid length");
        }
        state.files.insert(path.to_path_buf(), bytes);
        state.formatted.remove(&*path.to_string_lossy());
        self.fs.add_file(path, "");
        CommandOutcome::success("")
    }
}

fn next_auto(state: &mut HostSim) -> i32 {
    let priority = state.next_auto_priority;
    state.next_auto_priority -= 1;
    priority
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, op: &Operation) -> CommandOutcome {
        let mut state = self.lock();
        state.log.push(op.clone());

        let kind = op.kind();
        if state.unavailable.contains(&kind) {
            return CommandOutcome::unavailable(&format!("{:?}", kind));
        }
        if state.failures.contains(&kind) {
            return CommandOutcome::failed(1, format!("{:?} failed", kind));
        }

        let outcome = self.apply(&mut state, op);
        self.sync(&state);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::PriorityFlag;
    use crate::fs::FileSystem;
    use crate::size::GIB;

    #[test]
    fn test_activation_updates_live_table() {
        let exec = MockExecutor::new();
        let path = PathBuf::from("/swapfile");
        exec.execute(&Operation::AllocateFast {
            path: path.clone(),
            bytes: GIB,
        });
        exec.execute(&Operation::WriteSwapHeader {
            target: "/swapfile".to_string(),
        });
        let outcome = exec.execute(&Operation::Activate {
            target: "/swapfile".to_string(),
            priority: Some(10),
            flag: PriorityFlag::Long,
        });
        assert!(outcome.is_success());

        let table = exec.fs().read_to_string(Path::new("/proc/swaps")).unwrap();
        assert!(table.contains("/swapfile"));
        assert!(table.contains("1048576"));
        assert!(table.trim_end().ends_with("10"));
    }

    #[test]
    fn test_rename_carries_header_over_target() {
        let exec = MockExecutor::new().with_active_file("/swapfile", GIB, Some(1));
        exec.execute(&Operation::Deactivate {
            target: "/swapfile".to_string(),
        });
        let staging = PathBuf::from("/swapfile.new");
        exec.execute(&Operation::AllocateFast {
            path: staging.clone(),
            bytes: 2 * GIB,
        });
        exec.execute(&Operation::WriteSwapHeader {
            target: "/swapfile.new".to_string(),
        });
        let outcome = exec.execute(&Operation::RenameFile {
            from: staging,
            to: PathBuf::from("/swapfile"),
        });
        assert!(outcome.is_success());
        assert_eq!(exec.file_size("/swapfile"), Some(2 * GIB));
        assert_eq!(exec.file_size("/swapfile.new"), None);
        assert!(!exec.fs().exists(Path::new("/swapfile.new")));

        let activated = exec.execute(&Operation::Activate {
            target: "/swapfile".to_string(),
            priority: None,
            flag: PriorityFlag::Long,
        });
        assert!(activated.is_success());
    }

    #[test]
    fn test_activate_requires_header() {
        let exec = MockExecutor::new();
        exec.execute(&Operation::AllocateFast {
            path: PathBuf::from("/swapfile"),
            bytes: GIB,
        });
        let outcome = exec.execute(&Operation::Activate {
            target: "/swapfile".to_string(),
            priority: None,
            flag: PriorityFlag::Long,
        });
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_auto_priorities_descend() {
        let exec = MockExecutor::new()
            .with_active_file("/a", GIB, None)
            .with_active_file("/b", GIB, None);
        let table = exec.fs().contents("/proc/swaps").unwrap();
        assert!(table.contains("-2"));
        assert!(table.contains("-3"));
    }

    #[test]
    fn test_find_zram_skips_busy_devices() {
        let exec = MockExecutor::new().with_active_zram(0, GIB, 100);
        let outcome = exec.execute(&Operation::FindOrAllocateZram { bytes: GIB });
        assert_eq!(outcome.stdout.trim(), "/dev/zram1");
        assert!(exec.fs().exists(Path::new("/sys/block/zram1/disksize")));
    }

    #[test]
    fn test_injected_failures() {
        let exec = MockExecutor::new();
        exec.make_unavailable(OperationKind::FindOrAllocateZram);
        exec.fail_on(OperationKind::LoadZramModule);

        assert!(exec.execute(&Operation::FindOrAllocateZram { bytes: 1 }).is_unavailable());
        let load = exec.execute(&Operation::LoadZramModule);
        assert!(!load.is_success() && !load.is_unavailable());
        assert!(!exec.module_loaded());

        exec.restore(OperationKind::LoadZramModule);
        assert!(exec.execute(&Operation::LoadZramModule).is_success());
        assert_eq!(
            exec.kinds(),
            vec![
                OperationKind::FindOrAllocateZram,
                OperationKind::LoadZramModule,
                OperationKind::LoadZramModule,
            ]
        );
    }

    #[test]
    fn test_unload_refused_while_device_active() {
        let exec = MockExecutor::new().with_active_zram(0, GIB, 100);
        assert!(!exec.execute(&Operation::UnloadZramModule).is_success());
        exec.execute(&Operation::Deactivate {
            target: "/dev/zram0".to_string(),
        });
        assert!(exec.execute(&Operation::UnloadZramModule).is_success());
        assert!(!exec.fs().exists(Path::new("/sys/block/zram0")));
    }
}
