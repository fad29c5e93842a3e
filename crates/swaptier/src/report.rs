//! Plain-text rendering of inventories, outcomes and errors.

use std::fmt::Write;

use swaptier_core::SwapError;
use swaptier_core::entity::{EntityState, FileState, Outcome, Persistence, ZramState};
use swaptier_core::fmt::{FmtStyle, format_bytes, format_usage};
use swaptier_core::orchestrator::{HybridReport, HybridStatus, Inventory};

pub fn render_inventory(inventory: &Inventory) -> String {
    let mut out = String::new();
    if inventory.active.is_empty() {
        out.push_str("No active swap.\n");
    } else {
        let _ = writeln!(
            out,
            "{:<28} {:<6} {:>9} {:>9} {:>7} {:>9}",
            "IDENTIFIER", "KIND", "SIZE", "USED", "USE%", "PRIORITY"
        );
        for r in &inventory.active {
            let _ = writeln!(
                out,
                "{:<28} {:<6} {:>9} {:>9} {:>7} {:>9}",
                r.identifier,
                r.kind.to_string(),
                format_bytes(r.capacity_bytes, FmtStyle::Compact),
                format_bytes(r.used_bytes, FmtStyle::Compact),
                format_usage(r.used_bytes, r.capacity_bytes),
                r.priority
            );
        }
    }

    out.push_str("\nPersisted swap entries:\n");
    if inventory.persisted.is_empty() {
        out.push_str("  (none)\n");
    }
    for entry in &inventory.persisted {
        let _ = writeln!(out, "  {} ({})", entry.identifier, entry.options);
    }

    let _ = writeln!(
        out,
        "\nzram-generator: {}",
        if inventory.generator_available {
            "installed"
        } else {
            "not installed"
        }
    );
    for section in &inventory.generator_sections {
        let size = section
            .size
            .as_ref()
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let priority = section
            .priority
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let _ = writeln!(
            out,
            "  [{}] size {} MiB, priority {}",
            section.device, size, priority
        );
    }
    out
}

pub fn print_inventory(inventory: &Inventory) {
    print!("{}", render_inventory(inventory));
}

pub fn render_outcome(outcome: &Outcome) -> String {
    let mut out = format!("{}: {}\n", outcome.identifier, outcome.state);
    match &outcome.persistence {
        Persistence::Durable => out.push_str("  persisted\n"),
        Persistence::Degraded(reason) => {
            let _ = writeln!(out, "  runtime only: {}", reason);
        }
        Persistence::NotRequested => out.push_str("  not persisted (as requested)\n"),
        Persistence::Removed => out.push_str("  persisted entries removed\n"),
    }
    for note in &outcome.notes {
        let _ = writeln!(out, "  note: {}", note);
    }
    out
}

pub fn print_outcome(outcome: &Outcome) {
    print!("{}", render_outcome(outcome));
}

/// What the operator can do about a resource stuck in `state`.
fn recovery_hint(state: EntityState) -> Option<&'static str> {
    match state {
        EntityState::File(FileState::Formatted) | EntityState::Zram(ZramState::Formatted) => {
            Some("the resource is formatted but inactive; re-run the command to reactivate it")
        }
        EntityState::File(FileState::Allocated) | EntityState::Zram(ZramState::DeviceAllocated) => {
            Some("capacity is allocated but unformatted; re-run or remove it")
        }
        EntityState::File(FileState::Active) | EntityState::Zram(ZramState::Active) => {
            Some("the resource is still active and unchanged")
        }
        _ => None,
    }
}

pub fn render_error(err: &SwapError) -> String {
    let mut out = format!("error: {}\n", err);
    if let Some(hint) = err.reached().and_then(recovery_hint) {
        let _ = writeln!(out, "  {}", hint);
    }
    out
}

pub fn print_error(err: &SwapError) {
    eprint!("{}", render_error(err));
}

pub fn render_hybrid(report: &HybridReport) -> String {
    let mut out = String::new();
    for outcome in &report.removed {
        let _ = writeln!(out, "removed {}", outcome.identifier);
    }
    for outcome in &report.tiers {
        out.push_str(&render_outcome(outcome));
    }
    for failure in &report.failures {
        let _ = writeln!(out, "skipped tier: {}", failure);
    }
    for note in &report.notes {
        let _ = writeln!(out, "note: {}", note);
    }
    match &report.status {
        HybridStatus::Complete => out.push_str("hybrid setup complete\n"),
        HybridStatus::Resized => out.push_str("existing swap resized; no hybrid setup\n"),
        HybridStatus::Aborted => out.push_str("aborted; nothing changed\n"),
        HybridStatus::Incomplete(err) => {
            out.push_str("hybrid setup incomplete\n");
            out.push_str(&render_error(err));
        }
    }
    out
}

pub fn print_hybrid(report: &HybridReport) {
    print!("{}", render_hybrid(report));
}
