//! Structured external operations and their outcomes.

use std::fmt;
use std::path::PathBuf;

/// How a priority is passed on activation.
///
/// Older activation tools only understand the short form, so callers try
/// `Long` first and fall back to `Short`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityFlag {
    Long,
    Short,
}

/// A privileged external operation with structured arguments.
///
/// Identifiers are user-supplied paths; they are passed as discrete
/// arguments and never interpolated into a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Human-readable dump of the live swap table.
    QueryLive,
    /// Fast allocation of a regular file of exactly `bytes`.
    AllocateFast { path: PathBuf, bytes: u64 },
    /// Zero-filled allocation of `mib` one-MiB blocks.
    AllocateZeroFill { path: PathBuf, mib: u64 },
    /// Owner-only access (0600).
    RestrictAccess { path: PathBuf },
    WriteSwapHeader { target: String },
    Activate {
        target: String,
        priority: Option<i32>,
        flag: PriorityFlag,
    },
    Deactivate { target: String },
    /// Finds a free compressed-memory device and sizes it; stdout carries
    /// the device path actually used.
    FindOrAllocateZram { bytes: u64 },
    ResetZram { device: String },
    /// Low-level disksize attribute write.
    WriteZramSize { device: String, bytes: u64 },
    LoadZramModule,
    UnloadZramModule,
    ReloadServiceConfig,
    DisableService { unit: String },
    RemoveFile { path: PathBuf },
    /// Moves `from` over `to`, replacing it.
    RenameFile { from: PathBuf, to: PathBuf },
    WriteFile { path: PathBuf, contents: String },
}

/// Field-less tag of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    QueryLive,
    AllocateFast,
    AllocateZeroFill,
    RestrictAccess,
    WriteSwapHeader,
    ActivateLong,
    ActivateShort,
    ActivatePlain,
    Deactivate,
    FindOrAllocateZram,
    ResetZram,
    WriteZramSize,
    LoadZramModule,
    UnloadZramModule,
    ReloadServiceConfig,
    DisableService,
    RemoveFile,
    RenameFile,
    WriteFile,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::QueryLive => OperationKind::QueryLive,
            Operation::AllocateFast { .. } => OperationKind::AllocateFast,
            Operation::AllocateZeroFill { .. } => OperationKind::AllocateZeroFill,
            Operation::RestrictAccess { .. } => OperationKind::RestrictAccess,
            Operation::WriteSwapHeader { .. } => OperationKind::WriteSwapHeader,
            Operation::Activate { priority: None, .. } => OperationKind::ActivatePlain,
            Operation::Activate {
                flag: PriorityFlag::Long,
                ..
            } => OperationKind::ActivateLong,
            Operation::Activate {
                flag: PriorityFlag::Short,
                ..
            } => OperationKind::ActivateShort,
            Operation::Deactivate { .. } => OperationKind::Deactivate,
            Operation::FindOrAllocateZram { .. } => OperationKind::FindOrAllocateZram,
            Operation::ResetZram { .. } => OperationKind::ResetZram,
            Operation::WriteZramSize { .. } => OperationKind::WriteZramSize,
            Operation::LoadZramModule => OperationKind::LoadZramModule,
            Operation::UnloadZramModule => OperationKind::UnloadZramModule,
            Operation::ReloadServiceConfig => OperationKind::ReloadServiceConfig,
            Operation::DisableService { .. } => OperationKind::DisableService,
            Operation::RemoveFile { .. } => OperationKind::RemoveFile,
            Operation::RenameFile { .. } => OperationKind::RenameFile,
            Operation::WriteFile { .. } => OperationKind::WriteFile,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::QueryLive => write!(f, "query live swap table"),
            Operation::AllocateFast { path, bytes } => {
                write!(f, "allocate {} bytes at {}", bytes, path.display())
            }
            Operation::AllocateZeroFill { path, mib } => {
                write!(f, "zero-fill {} MiB at {}", mib, path.display())
            }
            Operation::RestrictAccess { path } => write!(f, "restrict {}", path.display()),
            Operation::WriteSwapHeader { target } => write!(f, "format {}", target),
            Operation::Activate {
                target,
                priority: Some(p),
                flag,
            } => write!(f, "activate {} (priority {}, {:?} flag)", target, p, flag),
            Operation::Activate { target, .. } => write!(f, "activate {}", target),
            Operation::Deactivate { target } => write!(f, "deactivate {}", target),
            Operation::FindOrAllocateZram { bytes } => {
                write!(f, "allocate zram device of {} bytes", bytes)
            }
            Operation::ResetZram { device } => write!(f, "reset {}", device),
            Operation::WriteZramSize { device, bytes } => {
                write!(f, "write disksize {} to {}", bytes, device)
            }
            Operation::LoadZramModule => write!(f, "load zram module"),
            Operation::UnloadZramModule => write!(f, "unload zram module"),
            Operation::ReloadServiceConfig => write!(f, "reload service manager"),
            Operation::DisableService { unit } => write!(f, "disable {}", unit),
            Operation::RemoveFile { path } => write!(f, "remove {}", path.display()),
            Operation::RenameFile { from, to } => {
                write!(f, "move {} to {}", from.display(), to.display())
            }
            Operation::WriteFile { path, .. } => write!(f, "write {}", path.display()),
        }
    }
}

/// Result of an external operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// Ran and failed; exit code when the process was not killed by a signal.
    Failed(Option<i32>),
    /// The underlying tool is not installed.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failed(Some(code)),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn unavailable(tool: &str) -> Self {
        Self {
            status: CommandStatus::Unavailable,
            stdout: String::new(),
            stderr: format!("{} not found", tool),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == CommandStatus::Unavailable
    }

    /// Short diagnostic suitable for error details and notes.
    pub fn diagnostic(&self) -> String {
        let text = self.stderr.trim();
        match self.status {
            CommandStatus::Success => "ok".to_string(),
            CommandStatus::Unavailable => text.to_string(),
            CommandStatus::Failed(Some(code)) if text.is_empty() => {
                format!("exit code {}", code)
            }
            CommandStatus::Failed(None) if text.is_empty() => "terminated by signal".to_string(),
            CommandStatus::Failed(_) => text.to_string(),
        }
    }
}

/// Executes privileged external operations.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, op: &Operation) -> CommandOutcome;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn execute(&self, op: &Operation) -> CommandOutcome {
        (**self).execute(op)
    }
}
