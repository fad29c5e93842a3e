//! swaptier - tiered swap manager.
//!
//! Inspects live and persisted swap, creates/resizes/reprioritizes/removes
//! swap files and zram devices, and builds a zram + swap file hybrid.
//! Without a subcommand an interactive menu is shown.

mod menu;
mod report;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use swaptier_core::entity::{Backend, DesiredOperation, Outcome};
use swaptier_core::exec::{Privilege, PrivilegedFs, SystemExecutor, ToolLocator};
use swaptier_core::fs::RealFs;
use swaptier_core::orchestrator::{
    ConflictChoice, FixedChoice, HybridRequest, Orchestrator, TierRequest,
};
use swaptier_core::{Host, HostPaths, SwapError};

/// Exit status after an interrupt, as a shell would report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

pub(crate) type SystemHost = Host<PrivilegedFs, SystemExecutor>;

/// Tiered swap manager: zram in front of swap files.
#[derive(Parser, Debug)]
#[command(name = "swaptier", about = "Tiered swap manager (zram + swap files)", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// How privileged commands are launched. `auto` uses sudo unless
    /// running as root.
    #[arg(long, value_enum, default_value = "auto", env = "SWAPTIER_PRIVILEGE", global = true)]
    privilege: PrivilegeArg,

    /// Kernel live swap table.
    #[arg(long, default_value = "/proc/swaps", env = "SWAPTIER_PROC_SWAPS", global = true)]
    proc_swaps: PathBuf,

    /// Persisted mount table.
    #[arg(long, default_value = "/etc/fstab", env = "SWAPTIER_FSTAB", global = true)]
    fstab: PathBuf,

    /// zram-generator configuration file.
    #[arg(
        long,
        default_value = "/etc/systemd/zram-generator.conf",
        env = "SWAPTIER_GENERATOR_CONF",
        global = true
    )]
    generator_conf: PathBuf,

    /// sysfs block device root.
    #[arg(long, default_value = "/sys/block", env = "SWAPTIER_SYS_BLOCK", global = true)]
    sys_block: PathBuf,

    /// Swap file used when no path is given.
    #[arg(long, default_value = "/swapfile", env = "SWAPTIER_SWAPFILE", global = true)]
    swapfile: PathBuf,

    /// Lock file held during every change.
    #[arg(long, default_value = "/run/swaptier.lock", env = "SWAPTIER_LOCK", global = true)]
    lock_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show live swap, persisted entries and zram-generator sections.
    Inspect {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Create a swap file or zram device.
    Create {
        #[arg(long, value_enum, default_value = "file")]
        kind: KindArg,
        /// Size, e.g. "8G", "512M" or "2048" (MiB).
        size: String,
        /// Swap file path or preferred zram device.
        #[arg(long)]
        target: Option<String>,
        #[arg(short, long, allow_negative_numbers = true)]
        priority: Option<i32>,
        /// Do not write the mount table or generator section.
        #[arg(long)]
        no_persist: bool,
    },
    /// Resize a swap file or zram device, keeping its priority.
    Resize { target: String, size: String },
    /// Change the priority of a swap file or zram device.
    Priority {
        target: String,
        #[arg(allow_negative_numbers = true)]
        priority: i32,
    },
    /// Deactivate and delete a swap file or zram device.
    Remove { target: String },
    /// Set up zram in front of a swap file.
    Hybrid {
        /// zram tier size; no zram tier when omitted.
        #[arg(long)]
        zram_size: Option<String>,
        /// zram tier priority (default 100).
        #[arg(long, allow_negative_numbers = true)]
        zram_priority: Option<i32>,
        /// Swap file tier size.
        #[arg(long)]
        file_size: String,
        /// Swap file tier priority (default -1).
        #[arg(long, allow_negative_numbers = true)]
        file_priority: Option<i32>,
        /// Swap file path; derived from --swapfile when omitted.
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        no_persist: bool,
        /// What to do when swap is already active.
        #[arg(long, value_enum, default_value = "ask")]
        on_conflict: ConflictArg,
        /// Resource to resize with --on-conflict resize.
        #[arg(long, required_if_eq("on_conflict", "resize"))]
        resize_target: Option<String>,
        /// New size with --on-conflict resize.
        #[arg(long, required_if_eq("on_conflict", "resize"))]
        resize_size: Option<String>,
    },
    /// Interactive menu (default).
    Menu,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PrivilegeArg {
    Auto,
    Sudo,
    Direct,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KindArg {
    File,
    Zram,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ConflictArg {
    Ask,
    Coexist,
    Replace,
    Resize,
    Abort,
}

impl Cmd {
    fn is_mutating(&self) -> bool {
        !matches!(self, Cmd::Inspect { .. })
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["swaptier", "swaptier_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Pending SIGINT. Recorded by the handler and checked between steps; a
/// running destructive sequence is never cut short.
#[derive(Clone, Default)]
pub(crate) struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    fn install() -> Self {
        let interrupt = Self::default();
        let flag = interrupt.0.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("interrupt received; finishing the current step");
            flag.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }
        interrupt
    }

    pub(crate) fn pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Args {
    fn paths(&self) -> HostPaths {
        HostPaths {
            proc_swaps: self.proc_swaps.clone(),
            fstab: self.fstab.clone(),
            generator_conf: self.generator_conf.clone(),
            sys_block: self.sys_block.clone(),
            default_swapfile: self.swapfile.clone(),
            lock_file: self.lock_file.clone(),
            ..HostPaths::default()
        }
    }

    fn privilege(&self) -> Privilege {
        match self.privilege {
            PrivilegeArg::Auto => Privilege::detect(&RealFs::new()),
            PrivilegeArg::Sudo => Privilege::Sudo,
            PrivilegeArg::Direct => Privilege::Direct,
        }
    }
}

fn build_host(args: &Args) -> SystemHost {
    let privilege = args.privilege();
    debug!("privilege mode: {:?}", privilege);
    let exec = SystemExecutor::new(privilege, ToolLocator::from_env(), args.sys_block.clone());
    let fs = PrivilegedFs::new(exec.clone());
    Host::new(fs, exec, args.paths())
}

fn conflict_choice(
    on_conflict: ConflictArg,
    resize_target: Option<String>,
    resize_size: Option<String>,
) -> Option<ConflictChoice> {
    match on_conflict {
        ConflictArg::Ask => None,
        ConflictArg::Coexist => Some(ConflictChoice::Coexist),
        ConflictArg::Replace => Some(ConflictChoice::Replace),
        ConflictArg::Abort => Some(ConflictChoice::Abort),
        ConflictArg::Resize => Some(ConflictChoice::Resize {
            identifier: resize_target.unwrap_or_default(),
            size: resize_size.unwrap_or_default(),
        }),
    }
}

/// Runs one subcommand. `Ok(false)` means it finished without reaching the
/// requested state.
fn run(cmd: Cmd, host: &SystemHost, interrupt: &Interrupt) -> Result<bool, SwapError> {
    let orchestrator = Orchestrator::new(host);
    match cmd {
        Cmd::Inspect { json } => {
            let inventory = orchestrator.inspect()?;
            if json {
                match serde_json::to_string_pretty(&inventory) {
                    Ok(text) => println!("{}", text),
                    Err(e) => return Err(SwapError::Io(io::Error::other(e))),
                }
            } else {
                report::print_inventory(&inventory);
            }
            Ok(true)
        }
        Cmd::Create {
            kind,
            size,
            target,
            priority,
            no_persist,
        } => {
            let op = DesiredOperation::Create {
                target,
                size,
                priority,
                persist: !no_persist,
            };
            let backend = match kind {
                KindArg::File => Backend::FileBacked,
                KindArg::Zram => Backend::CompressedMemory,
            };
            finish(backend.apply(host, &op))
        }
        Cmd::Resize { target, size } => {
            finish(orchestrator.apply(&DesiredOperation::Resize { target, size }))
        }
        Cmd::Priority { target, priority } => finish(
            orchestrator.apply(&DesiredOperation::Reprioritize { target, priority }),
        ),
        Cmd::Remove { target } => finish(orchestrator.apply(&DesiredOperation::Remove { target })),
        Cmd::Hybrid {
            zram_size,
            zram_priority,
            file_size,
            file_priority,
            path,
            no_persist,
            on_conflict,
            resize_target,
            resize_size,
        } => {
            let request = HybridRequest {
                zram: zram_size.map(|size| TierRequest {
                    size,
                    priority: zram_priority,
                }),
                file: TierRequest {
                    size: file_size,
                    priority: file_priority,
                },
                file_path: path,
                persist: !no_persist,
            };
            let report = match conflict_choice(on_conflict, resize_target, resize_size) {
                Some(choice) => orchestrator.hybrid(&request, &mut FixedChoice(choice)),
                None => {
                    let mut prompt = menu::Prompt::stdio(interrupt.clone());
                    orchestrator.hybrid(&request, &mut prompt)
                }
            };
            report::print_hybrid(&report);
            Ok(report.is_complete())
        }
        Cmd::Menu => {
            let mut prompt = menu::Prompt::stdio(interrupt.clone());
            menu::run(host, &mut prompt);
            Ok(true)
        }
    }
}

fn finish(result: Result<Outcome, SwapError>) -> Result<bool, SwapError> {
    let outcome = result?;
    report::print_outcome(&outcome);
    Ok(true)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    debug!("swaptier {} starting", env!("CARGO_PKG_VERSION"));

    let interrupt = Interrupt::install();
    let host = build_host(&args);
    let cmd = args.command.unwrap_or(Cmd::Menu);

    if cmd.is_mutating() {
        let auth = host.executor().prime_credentials();
        if !auth.is_success() {
            let detail = format!("cannot obtain privileges: {}", auth.diagnostic());
            report::print_error(&SwapError::Io(io::Error::other(detail)));
            return ExitCode::FAILURE;
        }
    }

    // The menu takes the lock per action so inspecting never blocks others.
    let _lock = if cmd.is_mutating() && !matches!(cmd, Cmd::Menu) {
        match host.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                report::print_error(&e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let status = match run(cmd, &host, &interrupt) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report::print_error(&e);
            ExitCode::FAILURE
        }
    };

    if interrupt.pending() {
        info!("interrupted");
        return ExitCode::from(EXIT_INTERRUPTED);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_host_paths() {
        let args = Args::try_parse_from(["swaptier", "inspect"]).unwrap();
        assert_eq!(args.paths(), HostPaths::default());
        assert!(matches!(args.command, Some(Cmd::Inspect { json: false })));
    }

    #[test]
    fn test_negative_priorities_parse() {
        let args =
            Args::try_parse_from(["swaptier", "create", "8G", "--priority", "-1"]).unwrap();
        let Some(Cmd::Create { priority, kind, .. }) = args.command else {
            panic!("expected create");
        };
        assert_eq!(priority, Some(-1));
        assert_eq!(kind, KindArg::File);

        let args = Args::try_parse_from(["swaptier", "priority", "/swapfile", "-5"]).unwrap();
        assert!(matches!(args.command, Some(Cmd::Priority { priority: -5, .. })));
    }

    #[test]
    fn test_resize_conflict_requires_target() {
        let err = Args::try_parse_from([
            "swaptier",
            "hybrid",
            "--file-size",
            "8G",
            "--on-conflict",
            "resize",
        ]);
        assert!(err.is_err());

        let args = Args::try_parse_from([
            "swaptier",
            "hybrid",
            "--file-size",
            "8G",
            "--on-conflict",
            "resize",
            "--resize-target",
            "/swapfile",
            "--resize-size",
            "4G",
        ])
        .unwrap();
        let Some(Cmd::Hybrid {
            on_conflict,
            resize_target,
            resize_size,
            ..
        }) = args.command
        else {
            panic!("expected hybrid");
        };
        assert_eq!(
            conflict_choice(on_conflict, resize_target, resize_size),
            Some(ConflictChoice::Resize {
                identifier: "/swapfile".to_string(),
                size: "4G".to_string(),
            })
        );
    }

    #[test]
    fn test_only_inspect_is_read_only() {
        assert!(!Cmd::Inspect { json: true }.is_mutating());
        assert!(Cmd::Remove {
            target: "/swapfile".to_string()
        }
        .is_mutating());
    }

    #[test]
    fn test_every_instance_locks_the_same_file() {
        use swaptier_core::exec::MockExecutor;

        let dir = tempfile::tempdir().unwrap();
        let paths = HostPaths {
            lock_file: dir.path().join("swaptier.lock"),
            ..HostPaths::default()
        };
        let exec = MockExecutor::new();
        let first = Host::new(RealFs::new(), exec.clone(), paths.clone());
        let second = Host::new(RealFs::new(), exec, paths);

        let held = first.lock().unwrap();
        assert!(matches!(second.lock(), Err(SwapError::Locked { .. })));
        drop(held);
        assert!(second.lock().is_ok());
    }
}
