//! External privileged operations.
//!
//! Every allocation, format, activation and persistence side effect is an
//! [`Operation`] run through a [`CommandExecutor`]:
//!
//! ```text
//!   entity / config stores
//!            │ Operation
//!     ┌──────▼──────────┐
//!     │ CommandExecutor │ (trait)
//!     └──────┬──────────┘
//!      ┌─────┴────────────┐
//! ┌────▼───────────┐ ┌────▼─────────┐
//! │ SystemExecutor │ │ MockExecutor │
//! │ (argv + sudo)  │ │ (simulated)  │
//! └────────────────┘ └──────────────┘
//! ```

pub mod mock;
mod operation;
pub mod system;

use tracing::warn;

pub use mock::MockExecutor;
pub use operation::{
    CommandExecutor, CommandOutcome, CommandStatus, Operation, OperationKind, PriorityFlag,
};
pub use system::{Privilege, PrivilegedFs, SystemExecutor, ToolLocator};

/// Runs an operation whose failure must not abort the caller.
///
/// Returns `None` on success, otherwise a note describing the failure.
pub fn best_effort<E: CommandExecutor + ?Sized>(exec: &E, op: &Operation) -> Option<String> {
    let outcome = exec.execute(op);
    if outcome.is_success() {
        return None;
    }
    let note = format!("{} skipped: {}", op, outcome.diagnostic());
    warn!("{}", note);
    Some(note)
}
