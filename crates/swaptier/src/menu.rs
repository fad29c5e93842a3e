//! Interactive menu and prompt-driven conflict decisions.
//!
//! A pending interrupt, end of input or an empty answer at a choice
//! cancels the current action. Interrupts are checked only between
//! prompts and never inside a running operation.

use std::io::{self, BufRead, Write};

use tracing::warn;

use swaptier_core::entity::{Backend, DesiredOperation, Outcome};
use swaptier_core::exec::CommandExecutor;
use swaptier_core::fs::FileSystem;
use swaptier_core::orchestrator::{
    ConflictChoice, DecisionMaker, HybridRequest, Orchestrator, TierRequest,
};
use swaptier_core::probe::Classification;
use swaptier_core::{Host, SwapError};

use crate::{Interrupt, report};

pub struct Prompt<R: BufRead, W: Write> {
    input: R,
    output: W,
    interrupt: Interrupt,
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio(interrupt: Interrupt) -> Self {
        Prompt::new(io::stdin().lock(), io::stdout(), interrupt)
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W, interrupt: Interrupt) -> Self {
        Self {
            input,
            output,
            interrupt,
        }
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.output, "{}", text);
    }

    /// Reads one trimmed answer; `None` on end of input or interrupt.
    fn ask(&mut self, question: &str) -> Option<String> {
        if self.interrupt.pending() {
            return None;
        }
        let _ = write!(self.output, "{} ", question);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) if self.interrupt.pending() => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                warn!("cannot read answer: {}", e);
                None
            }
        }
    }

    /// Answer with a default for an empty reply.
    fn ask_or(&mut self, question: &str, default: &str) -> Option<String> {
        let answer = self.ask(&format!("{} [{}]:", question, default))?;
        Some(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    /// Optional integer; empty means `None`. Re-asks on garbage.
    fn ask_priority(&mut self, question: &str) -> Option<Option<i32>> {
        loop {
            let answer = self.ask(&format!("{} (empty for default):", question))?;
            if answer.is_empty() {
                return Some(None);
            }
            match answer.parse() {
                Ok(p) => return Some(Some(p)),
                Err(_) => self.say("Please enter a whole number."),
            }
        }
    }

    fn confirm(&mut self, question: &str) -> Option<bool> {
        let answer = self.ask(&format!("{} [y/N]:", question))?;
        Some(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    /// Numbered choice, 1-based on screen, 0-based returned.
    fn choose(&mut self, title: &str, options: &[String]) -> Option<usize> {
        self.say(title);
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", i + 1, option));
        }
        loop {
            let answer = self.ask("Choice:")?;
            if answer.is_empty() {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Some(n - 1),
                _ => self.say(&format!("Enter a number from 1 to {}.", options.len())),
            }
        }
    }
}

impl<R: BufRead, W: Write> DecisionMaker for Prompt<R, W> {
    fn resolve_conflict(&mut self, existing: &Classification) -> ConflictChoice {
        self.say("Swap is already active:");
        for id in &existing.compressed_memory {
            self.say(&format!("  zram   {}", id));
        }
        for id in &existing.file_backed {
            self.say(&format!("  file   {}", id));
        }
        for id in &existing.other {
            self.say(&format!("  other  {}", id));
        }

        let options = [
            "Coexist: keep it and add the new tiers",
            "Replace: remove zram devices and swap files first",
            "Resize an existing resource instead",
            "Abort",
        ]
        .map(String::from);
        match self.choose("What now?", &options) {
            Some(0) => ConflictChoice::Coexist,
            Some(1) => ConflictChoice::Replace,
            Some(2) => self.pick_resize(existing).unwrap_or(ConflictChoice::Abort),
            _ => ConflictChoice::Abort,
        }
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    fn pick_resize(&mut self, existing: &Classification) -> Option<ConflictChoice> {
        let candidates: Vec<String> = existing
            .compressed_memory
            .iter()
            .chain(&existing.file_backed)
            .cloned()
            .collect();
        if candidates.is_empty() {
            self.say("Only partitions are active; they cannot be resized here.");
            return None;
        }
        let index = self.choose("Resize which resource?", &candidates)?;
        let size = self.ask("New size (e.g. 4G):")?;
        if size.is_empty() {
            return None;
        }
        Some(ConflictChoice::Resize {
            identifier: candidates[index].clone(),
            size,
        })
    }
}

/// Menu actions, in display order.
const ACTIONS: [&str; 8] = [
    "Inspect swap",
    "Create swap file",
    "Create zram device",
    "Hybrid setup (zram + swap file)",
    "Resize",
    "Change priority",
    "Remove",
    "Exit",
];

/// Runs the menu until the operator exits, input ends or an interrupt
/// arrives.
pub fn run<F, E, R, W>(host: &Host<F, E>, prompt: &mut Prompt<R, W>)
where
    F: FileSystem,
    E: CommandExecutor,
    R: BufRead,
    W: Write,
{
    let actions = ACTIONS.map(String::from);
    loop {
        let Some(action) = prompt.choose("\nswaptier", &actions) else {
            return;
        };
        if action == ACTIONS.len() - 1 {
            return;
        }
        let orchestrator = Orchestrator::new(host);
        if action == 0 {
            match orchestrator.inspect() {
                Ok(inventory) => prompt.say(report::render_inventory(&inventory).trim_end()),
                Err(e) => prompt.say(report::render_error(&e).trim_end()),
            }
            continue;
        }

        let lock = match host.lock() {
            Ok(lock) => lock,
            Err(e) => {
                prompt.say(report::render_error(&e).trim_end());
                continue;
            }
        };
        let text = match action {
            3 => hybrid(&orchestrator, prompt),
            _ => single(host, &orchestrator, prompt, action).map(|r| match r {
                Ok(outcome) => report::render_outcome(&outcome),
                Err(e) => report::render_error(&e),
            }),
        };
        drop(lock);
        match text {
            Some(text) => prompt.say(text.trim_end()),
            None => prompt.say("Cancelled."),
        }
        if prompt.interrupt.pending() {
            return;
        }
    }
}

/// Collects the answers for one single-resource action and runs it.
/// `None` means the operator cancelled before anything changed.
fn single<F, E, R, W>(
    host: &Host<F, E>,
    orchestrator: &Orchestrator<'_, F, E>,
    prompt: &mut Prompt<R, W>,
    action: usize,
) -> Option<Result<Outcome, SwapError>>
where
    F: FileSystem,
    E: CommandExecutor,
    R: BufRead,
    W: Write,
{
    match action {
        1 => {
            let default = host.paths().default_swapfile.to_string_lossy().into_owned();
            let path = prompt.ask_or("Swap file path", &default)?;
            let size = prompt.ask_or("Size", "4G")?;
            let priority = prompt.ask_priority("Priority")?;
            let persist = prompt.confirm("Persist in the mount table?")?;
            let op = DesiredOperation::Create {
                target: Some(path),
                size,
                priority,
                persist,
            };
            Some(Backend::FileBacked.apply(host, &op))
        }
        2 => {
            let size = prompt.ask_or("Size", "2G")?;
            let priority = prompt.ask_priority("Priority")?;
            let persist = prompt.confirm("Persist through zram-generator?")?;
            let op = DesiredOperation::Create {
                target: None,
                size,
                priority,
                persist,
            };
            Some(Backend::CompressedMemory.apply(host, &op))
        }
        4 => {
            let target = pick_active(host, prompt, "Resize which resource?")?;
            let size = prompt.ask("New size:")?;
            Some(orchestrator.apply(&DesiredOperation::Resize { target, size }))
        }
        5 => {
            let target = pick_active(host, prompt, "Reprioritize which resource?")?;
            let priority = prompt.ask_priority("New priority")??;
            Some(orchestrator.apply(&DesiredOperation::Reprioritize { target, priority }))
        }
        6 => {
            let target = pick_active(host, prompt, "Remove which resource?")?;
            if !prompt.confirm(&format!("Remove {}?", target))? {
                return None;
            }
            Some(orchestrator.apply(&DesiredOperation::Remove { target }))
        }
        _ => None,
    }
}

/// Lets the operator pick a live zram device or swap file.
fn pick_active<F, E, R, W>(host: &Host<F, E>, prompt: &mut Prompt<R, W>, title: &str) -> Option<String>
where
    F: FileSystem,
    E: CommandExecutor,
    R: BufRead,
    W: Write,
{
    let classes = host.probe().classify();
    let candidates: Vec<String> = classes
        .compressed_memory
        .into_iter()
        .chain(classes.file_backed)
        .collect();
    if candidates.is_empty() {
        prompt.say("No zram device or swap file is active.");
        return None;
    }
    let index = prompt.choose(title, &candidates)?;
    candidates.into_iter().nth(index)
}

fn hybrid<F, E, R, W>(orchestrator: &Orchestrator<'_, F, E>, prompt: &mut Prompt<R, W>) -> Option<String>
where
    F: FileSystem,
    E: CommandExecutor,
    R: BufRead,
    W: Write,
{
    let zram = if prompt.confirm("Add a zram tier?")? {
        Some(TierRequest {
            size: prompt.ask_or("zram size", "2G")?,
            priority: prompt.ask_priority("zram priority (100)")?,
        })
    } else {
        None
    };
    let file = TierRequest {
        size: prompt.ask_or("Swap file size", "8G")?,
        priority: prompt.ask_priority("Swap file priority (-1)")?,
    };
    let request = HybridRequest {
        zram,
        file,
        file_path: None,
        persist: true,
    };
    let report = orchestrator.hybrid(&request, prompt);
    Some(report::render_hybrid(&report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use swaptier_core::HostPaths;
    use swaptier_core::exec::MockExecutor;
    use swaptier_core::size::GIB;

    fn prompt(input: &str) -> Prompt<Cursor<Vec<u8>>, Vec<u8>> {
        Prompt::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            Interrupt::default(),
        )
    }

    fn existing() -> Classification {
        Classification {
            compressed_memory: vec!["/dev/zram0".to_string()],
            file_backed: vec!["/swapfile".to_string()],
            other: vec!["/dev/sda2".to_string()],
        }
    }

    #[test]
    fn test_conflict_choices() {
        assert_eq!(
            prompt("1\n").resolve_conflict(&existing()),
            ConflictChoice::Coexist
        );
        assert_eq!(
            prompt("9\n2\n").resolve_conflict(&existing()),
            ConflictChoice::Replace
        );
        assert_eq!(
            prompt("3\n2\n4G\n").resolve_conflict(&existing()),
            ConflictChoice::Resize {
                identifier: "/swapfile".to_string(),
                size: "4G".to_string(),
            }
        );
    }

    #[test]
    fn test_end_of_input_aborts() {
        assert_eq!(prompt("").resolve_conflict(&existing()), ConflictChoice::Abort);
        assert_eq!(prompt("3\n").resolve_conflict(&existing()), ConflictChoice::Abort);
    }

    #[test]
    fn test_pending_interrupt_aborts() {
        let mut p = prompt("2\n");
        p.interrupt.0.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(p.resolve_conflict(&existing()), ConflictChoice::Abort);
    }

    #[test]
    fn test_menu_creates_swap_file() {
        let dir = tempfile::tempdir().unwrap();
        let exec = MockExecutor::new();
        let paths = HostPaths {
            lock_file: dir.path().join("swaptier.lock"),
            ..HostPaths::default()
        };
        let host = Host::new(exec.fs(), exec.clone(), paths);

        // create swap file at the default path, 1G, priority 5, persisted; exit
        let mut p = prompt("2\n\n1G\n5\ny\n8\n");
        run(&host, &mut p);

        let live = host.probe().find("/swapfile").unwrap();
        assert_eq!(live.capacity_bytes, GIB);
        assert_eq!(live.priority, 5);
        assert_eq!(host.fstab().priority_of("/swapfile"), Some(5));
        let screen = String::from_utf8(p.output).unwrap();
        assert!(screen.contains("active, persisted"));
        assert!(host.lock().is_ok());
    }

    #[test]
    fn test_menu_remove_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let exec = MockExecutor::new().with_active_file("/swapfile", GIB, Some(-1));
        let paths = HostPaths {
            lock_file: dir.path().join("swaptier.lock"),
            ..HostPaths::default()
        };
        let host = Host::new(exec.fs(), exec.clone(), paths);

        let mut p = prompt("7\n1\nn\n8\n");
        run(&host, &mut p);
        assert!(host.probe().is_active("/swapfile"));
        assert!(String::from_utf8(p.output).unwrap().contains("Cancelled."));
    }
}
