//! Real executor: maps operations onto argv vectors of system utilities.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::operation::{CommandExecutor, CommandOutcome, CommandStatus, Operation, PriorityFlag};
use crate::fs::{FileSystem, RealFs};

/// Directories searched after `PATH`; sbin tools are often missing from a
/// regular user's `PATH`.
const FALLBACK_DIRS: &[&str] = &["/usr/sbin", "/sbin", "/usr/bin", "/bin"];

/// How privileged operations are launched. Resolved once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Already running as root.
    Direct,
    /// Prefix every command with `sudo`.
    Sudo,
}

impl Privilege {
    /// Picks `Direct` when the effective UID in `/proc/self/status` is 0.
    pub fn detect<F: FileSystem>(fs: &F) -> Self {
        let euid = fs
            .read_to_string(Path::new("/proc/self/status"))
            .ok()
            .and_then(|content| effective_uid(&content));
        match euid {
            Some(0) => Privilege::Direct,
            _ => Privilege::Sudo,
        }
    }
}

/// Extracts the effective UID (second field of the `Uid:` line).
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find(|line| line.starts_with("Uid:"))?
        .split_whitespace()
        .nth(2)?
        .parse()
        .ok()
}

/// Finds executables in `PATH` and the usual sbin/bin directories.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_dirs: Vec<PathBuf>,
}

impl ToolLocator {
    pub fn from_env() -> Self {
        let mut search_dirs: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        for dir in FALLBACK_DIRS {
            let dir = PathBuf::from(dir);
            if !search_dirs.contains(&dir) {
                search_dirs.push(dir);
            }
        }
        Self { search_dirs }
    }

    pub fn with_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A resolved command line.
#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    tool: &'static str,
    args: Vec<OsString>,
    stdin: Option<String>,
}

impl Invocation {
    fn new(tool: &'static str) -> Self {
        Self {
            tool,
            args: Vec::new(),
            stdin: None,
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }
}

fn joined(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}

/// Runs operations with the host's system utilities.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    privilege: Privilege,
    tools: ToolLocator,
    sys_block: PathBuf,
}

impl SystemExecutor {
    pub fn new(privilege: Privilege, tools: ToolLocator, sys_block: impl Into<PathBuf>) -> Self {
        Self {
            privilege,
            tools,
            sys_block: sys_block.into(),
        }
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    fn sysfs_attr(&self, device: &str, attr: &str) -> PathBuf {
        let name = device.rsplit('/').next().unwrap_or(device);
        self.sys_block.join(name).join(attr)
    }

    fn invocation(&self, op: &Operation) -> Invocation {
        match op {
            Operation::QueryLive => Invocation::new("swapon").arg("--show"),
            Operation::AllocateFast { path, bytes } => Invocation::new("fallocate")
                .arg("-l")
                .arg(bytes.to_string())
                .arg(path),
            Operation::AllocateZeroFill { path, mib } => Invocation::new("dd")
                .arg("if=/dev/zero")
                .arg(joined("of=", path))
                .arg("bs=1M")
                .arg(format!("count={}", mib))
                .arg("status=none"),
            Operation::RestrictAccess { path } => Invocation::new("chmod").arg("600").arg(path),
            Operation::WriteSwapHeader { target } => Invocation::new("mkswap").arg(target),
            Operation::Activate {
                target,
                priority,
                flag,
            } => {
                let mut inv = Invocation::new("swapon");
                if let Some(p) = priority {
                    inv = match flag {
                        PriorityFlag::Long => inv.arg("--priority"),
                        PriorityFlag::Short => inv.arg("-p"),
                    }
                    .arg(p.to_string());
                }
                inv.arg(target)
            }
            Operation::Deactivate { target } => Invocation::new("swapoff").arg(target),
            Operation::FindOrAllocateZram { bytes } => Invocation::new("zramctl")
                .arg("--find")
                .arg("--size")
                .arg(bytes.to_string()),
            Operation::ResetZram { device } => {
                if self.tools.find("zramctl").is_some() {
                    Invocation::new("zramctl").arg("--reset").arg(device)
                } else {
                    Invocation::new("tee")
                        .arg(self.sysfs_attr(device, "reset"))
                        .stdin("1")
                }
            }
            Operation::WriteZramSize { device, bytes } => Invocation::new("tee")
                .arg(self.sysfs_attr(device, "disksize"))
                .stdin(bytes.to_string()),
            Operation::LoadZramModule => Invocation::new("modprobe").arg("zram"),
            Operation::UnloadZramModule => Invocation::new("modprobe").arg("-r").arg("zram"),
            Operation::ReloadServiceConfig => Invocation::new("systemctl").arg("daemon-reload"),
            Operation::DisableService { unit } => Invocation::new("systemctl")
                .arg("disable")
                .arg("--now")
                .arg(unit),
            Operation::RemoveFile { path } => Invocation::new("rm").arg("-f").arg(path),
            Operation::RenameFile { from, to } => {
                Invocation::new("mv").arg("-f").arg("--").arg(from).arg(to)
            }
            Operation::WriteFile { path, contents } => {
                Invocation::new("tee").arg(path).stdin(contents.clone())
            }
        }
    }

    fn command_for(&self, inv: &Invocation) -> Result<Command, CommandOutcome> {
        let tool = self
            .tools
            .find(inv.tool)
            .ok_or_else(|| CommandOutcome::unavailable(inv.tool))?;
        let mut cmd = match self.privilege {
            Privilege::Direct => Command::new(&tool),
            Privilege::Sudo => {
                let sudo = self
                    .tools
                    .find("sudo")
                    .ok_or_else(|| CommandOutcome::unavailable("sudo"))?;
                // Never prompt: the child is off the terminal's foreground
                // group, so credentials are primed by `prime_credentials`.
                let mut cmd = Command::new(sudo);
                cmd.arg("-n").arg(&tool);
                cmd
            }
        };
        cmd.args(&inv.args);
        detach_from_terminal_signals(&mut cmd);
        Ok(cmd)
    }

    /// Asks for the sudo password once, in the foreground, so later
    /// non-interactive commands can run. A no-op under `Privilege::Direct`.
    pub fn prime_credentials(&self) -> CommandOutcome {
        if self.privilege == Privilege::Direct {
            return CommandOutcome::success("");
        }
        let Some(sudo) = self.tools.find("sudo") else {
            return CommandOutcome::unavailable("sudo");
        };
        match Command::new(sudo).arg("-v").status() {
            Ok(status) if status.success() => CommandOutcome::success(""),
            Ok(status) => CommandOutcome {
                status: CommandStatus::Failed(status.code()),
                stdout: String::new(),
                stderr: "sudo: authentication failed".to_string(),
            },
            Err(e) => CommandOutcome {
                status: CommandStatus::Failed(None),
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

/// Starts the child in its own process group. A terminal interrupt then
/// reaches only this process, which records it and lets the running step
/// finish instead of killing it halfway.
#[cfg(unix)]
fn detach_from_terminal_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_from_terminal_signals(_cmd: &mut Command) {}

fn run(mut cmd: Command, stdin: Option<&str>) -> io::Result<CommandOutcome> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn()?;
    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(data.as_bytes())?;
    }
    let output = child.wait_with_output()?;

    let status = if output.status.success() {
        CommandStatus::Success
    } else {
        CommandStatus::Failed(output.status.code())
    };
    Ok(CommandOutcome {
        status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, op: &Operation) -> CommandOutcome {
        let inv = self.invocation(op);
        let cmd = match self.command_for(&inv) {
            Ok(cmd) => cmd,
            Err(outcome) => {
                debug!("{}: {}", op, outcome.diagnostic());
                return outcome;
            }
        };
        trace!("exec {:?}", cmd);

        let outcome = match run(cmd, inv.stdin.as_deref()) {
            Ok(outcome) => outcome,
            Err(e) if e.kind() == io::ErrorKind::NotFound => CommandOutcome::unavailable(inv.tool),
            Err(e) => CommandOutcome {
                status: CommandStatus::Failed(None),
                stdout: String::new(),
                stderr: e.to_string(),
            },
        };
        debug!("{}: {:?}", op, outcome.status);
        outcome
    }
}

/// Filesystem that reads directly and writes through the executor, so
/// root-owned records can be rewritten under `Privilege::Sudo`.
#[derive(Debug, Clone)]
pub struct PrivilegedFs {
    exec: SystemExecutor,
}

impl PrivilegedFs {
    pub fn new(exec: SystemExecutor) -> Self {
        Self { exec }
    }

    fn through_executor(&self, op: Operation) -> io::Result<()> {
        let outcome = self.exec.execute(&op);
        if outcome.is_success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{}: {}", op, outcome.diagnostic())))
        }
    }
}

impl FileSystem for PrivilegedFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        RealFs.read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        RealFs.exists(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        RealFs.read_dir(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        match self.exec.privilege {
            Privilege::Direct => RealFs.write(path, contents),
            Privilege::Sudo => self.through_executor(Operation::WriteFile {
                path: path.to_path_buf(),
                contents: contents.to_string(),
            }),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match self.exec.privilege {
            Privilege::Direct => RealFs.remove_file(path),
            Privilege::Sudo => self.through_executor(Operation::RemoveFile {
                path: path.to_path_buf(),
            }),
        }
    }
}
