//! Error type shared by every swap lifecycle operation.

use std::path::PathBuf;

use crate::entity::EntityState;
use crate::size::SizeParseError;

/// Failures of a swap lifecycle operation.
///
/// Variants raised after the first side effect carry the state the resource
/// reached before the failing step, so callers can tell "retry activation"
/// apart from "retry allocation".
#[derive(Debug)]
pub enum SwapError {
    /// Malformed or non-positive capacity text. Nothing was changed.
    InvalidSize(SizeParseError),
    /// No live or persisted resource matches the identifier.
    NotFound(String),
    /// The target is already an active swap area.
    AlreadyActive(String),
    /// Both allocation strategies failed.
    AllocationFailure {
        identifier: String,
        reached: EntityState,
        detail: String,
    },
    /// Access restriction or swap header write failed.
    FormatFailure {
        identifier: String,
        reached: EntityState,
        detail: String,
    },
    /// Every activation flag form was rejected.
    ActivationFailure {
        identifier: String,
        reached: EntityState,
        detail: String,
    },
    /// A live resource could not be taken offline before a destructive step.
    DeactivationFailure {
        identifier: String,
        reached: EntityState,
        detail: String,
    },
    /// A fallback strategy cannot safely address the requested target.
    UnsupportedFallback { identifier: String, detail: String },
    /// Another invocation holds the mutation lock.
    Locked { path: PathBuf, holder: String },
    /// I/O error on a live or persisted record.
    Io(std::io::Error),
}

impl SwapError {
    /// State the resource machine ended in, for errors raised mid-sequence.
    pub fn reached(&self) -> Option<EntityState> {
        match self {
            SwapError::AllocationFailure { reached, .. }
            | SwapError::FormatFailure { reached, .. }
            | SwapError::ActivationFailure { reached, .. }
            | SwapError::DeactivationFailure { reached, .. } => Some(*reached),
            _ => None,
        }
    }
}

impl std::fmt::Display for SwapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapError::InvalidSize(e) => write!(f, "{}", e),
            SwapError::NotFound(id) => write!(f, "{}: no such swap resource", id),
            SwapError::AlreadyActive(id) => write!(f, "{}: already an active swap area", id),
            SwapError::AllocationFailure {
                identifier,
                reached,
                detail,
            } => write!(
                f,
                "{}: allocation failed (state: {}): {}",
                identifier, reached, detail
            ),
            SwapError::FormatFailure {
                identifier,
                reached,
                detail,
            } => write!(
                f,
                "{}: format failed (state: {}): {}",
                identifier, reached, detail
            ),
            SwapError::ActivationFailure {
                identifier,
                reached,
                detail,
            } => write!(
                f,
                "{}: activation failed (state: {}): {}",
                identifier, reached, detail
            ),
            SwapError::DeactivationFailure {
                identifier,
                reached,
                detail,
            } => write!(
                f,
                "{}: deactivation failed (state: {}): {}",
                identifier, reached, detail
            ),
            SwapError::UnsupportedFallback { identifier, detail } => {
                write!(f, "{}: unsupported fallback: {}", identifier, detail)
            }
            SwapError::Locked { path, holder } => write!(
                f,
                "another swaptier instance holds {} (pid {})",
                path.display(),
                holder
            ),
            SwapError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SwapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SwapError::InvalidSize(e) => Some(e),
            SwapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SizeParseError> for SwapError {
    fn from(e: SizeParseError) -> Self {
        SwapError::InvalidSize(e)
    }
}

impl From<std::io::Error> for SwapError {
    fn from(e: std::io::Error) -> Self {
        SwapError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FileState;

    #[test]
    fn test_reached_state_reported() {
        let err = SwapError::ActivationFailure {
            identifier: "/swapfile".to_string(),
            reached: EntityState::File(FileState::Formatted),
            detail: "swapon: invalid argument".to_string(),
        };
        assert_eq!(err.reached(), Some(EntityState::File(FileState::Formatted)));
        let text = err.to_string();
        assert!(text.contains("/swapfile"));
        assert!(text.contains("formatted"));
    }

    #[test]
    fn test_invalid_size_has_no_state() {
        let err: SwapError = crate::size::parse_size("0G").unwrap_err().into();
        assert!(err.reached().is_none());
        assert!(matches!(err, SwapError::InvalidSize(_)));
    }
}
