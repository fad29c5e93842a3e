//! Host context: filesystem, executor and the locations of every record.

use std::path::PathBuf;

use crate::config::{ConfigLock, FstabStore, GeneratorStore};
use crate::error::SwapError;
use crate::exec::{CommandExecutor, CommandOutcome, Operation};
use crate::fs::FileSystem;
use crate::priority::PriorityResolver;
use crate::probe::ResourceProbe;

/// Locations of live and persisted swap state on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Kernel live swap table.
    pub proc_swaps: PathBuf,
    /// Persisted mount table.
    pub fstab: PathBuf,
    /// zram-generator configuration file.
    pub generator_conf: PathBuf,
    /// Candidate locations of the zram-generator binary; any existing one
    /// means generator persistence is available.
    pub generator_binaries: Vec<PathBuf>,
    /// sysfs block device root.
    pub sys_block: PathBuf,
    /// Swap file path used when none is supplied.
    pub default_swapfile: PathBuf,
    /// Mutation lock.
    pub lock_file: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            proc_swaps: PathBuf::from("/proc/swaps"),
            fstab: PathBuf::from("/etc/fstab"),
            generator_conf: PathBuf::from("/etc/systemd/zram-generator.conf"),
            generator_binaries: vec![
                PathBuf::from("/usr/lib/systemd/system-generators/zram-generator"),
                PathBuf::from("/lib/systemd/system-generators/zram-generator"),
            ],
            sys_block: PathBuf::from("/sys/block"),
            default_swapfile: PathBuf::from("/swapfile"),
            lock_file: PathBuf::from("/run/swaptier.lock"),
        }
    }
}

/// Everything a lifecycle operation needs to observe and change the host.
pub struct Host<F: FileSystem, E: CommandExecutor> {
    fs: F,
    exec: E,
    paths: HostPaths,
}

impl<F: FileSystem, E: CommandExecutor> Host<F, E> {
    pub fn new(fs: F, exec: E, paths: HostPaths) -> Self {
        Self { fs, exec, paths }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    /// Runs one external operation.
    pub fn run(&self, op: &Operation) -> CommandOutcome {
        self.exec.execute(op)
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    pub fn probe(&self) -> ResourceProbe<'_, F> {
        ResourceProbe::new(&self.fs, &self.paths.proc_swaps)
    }

    pub fn fstab(&self) -> FstabStore<'_, F> {
        FstabStore::new(&self.fs, &self.paths.fstab)
    }

    pub fn generator(&self) -> GeneratorStore<'_, F> {
        GeneratorStore::new(
            &self.fs,
            &self.paths.generator_conf,
            &self.paths.generator_binaries,
        )
    }

    pub fn resolver(&self) -> PriorityResolver<'_, F> {
        PriorityResolver::new(self.probe(), self.fstab(), self.generator())
    }

    /// Takes the mutation lock at its fixed location.
    pub fn lock(&self) -> Result<ConfigLock, SwapError> {
        ConfigLock::acquire(&self.fs, &self.paths.lock_file)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::exec::MockExecutor;
    use crate::fs::MockFs;

    pub(crate) type MockHost = Host<MockFs, MockExecutor>;

    /// Host over a simulated executor; the returned executor shares state.
    pub(crate) fn mock_host(exec: MockExecutor) -> (MockHost, MockExecutor) {
        let host = Host::new(exec.fs(), exec.clone(), HostPaths::default());
        (host, exec)
    }

    /// Marks zram-generator as installed.
    pub(crate) fn install_generator(exec: &MockExecutor) {
        exec.fs().add_file(
            "/usr/lib/systemd/system-generators/zram-generator",
            "",
        );
    }
}
