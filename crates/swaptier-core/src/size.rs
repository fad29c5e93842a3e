//! Capacity parser for human-entered sizes.
//!
//! Accepts a positive decimal value with an optional unit suffix:
//!
//! | Suffix | Multiplier |
//! |--------|------------|
//! | `k`, `ki`, `kb` | 1024 |
//! | `m`, `mi`, `mb`, none | 1024² |
//! | `g`, `gi`, `gb` | 1024³ |
//!
//! Only the first letter of the suffix is significant, so `kb` and `ki` are
//! the same binary multiple.

use std::sync::LazyLock;

use regex::Regex;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?\s*([a-z]*)$").expect("size pattern is valid")
});

/// Error type for capacity parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeParseError {
    pub input: String,
    pub message: String,
}

impl SizeParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SizeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid size '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for SizeParseError {}

/// Parses a capacity string into an exact byte count.
///
/// ```
/// use swaptier_core::size::parse_size;
///
/// assert_eq!(parse_size("8G").unwrap(), 8 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("512").unwrap(), 512 * 1024 * 1024);
/// assert!(parse_size("0G").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let text = input.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Err(SizeParseError::new(input, "empty size"));
    }

    let caps = SIZE_RE.captures(&text).ok_or_else(|| {
        SizeParseError::new(input, "expected a positive number with optional unit (e.g. 8G, 4096M)")
    })?;

    let multiplier = unit_multiplier(&caps[3])
        .ok_or_else(|| SizeParseError::new(input, format!("unknown unit '{}'", &caps[3])))?;

    let whole: u64 = caps[1]
        .parse()
        .map_err(|_| SizeParseError::new(input, "value out of range"))?;
    let whole_bytes = whole
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(input, "value out of range"))?;

    // Fractional part is scaled separately so integer inputs stay exact.
    let fraction_bytes = match caps.get(2) {
        Some(frac) => {
            let digits = frac.as_str();
            let value: f64 = format!("0.{digits}").parse().unwrap_or(0.0);
            (value * multiplier as f64) as u64
        }
        None => 0,
    };

    let bytes = whole_bytes
        .checked_add(fraction_bytes)
        .ok_or_else(|| SizeParseError::new(input, "value out of range"))?;
    if bytes == 0 {
        return Err(SizeParseError::new(input, "size must be greater than zero"));
    }
    Ok(bytes)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    if unit.is_empty() {
        return Some(MIB);
    }
    if !matches!(unit, "k" | "ki" | "kb" | "m" | "mi" | "mb" | "g" | "gi" | "gb") {
        return None;
    }
    match unit.as_bytes()[0] {
        b'k' => Some(KIB),
        b'm' => Some(MIB),
        b'g' => Some(GIB),
        _ => None,
    }
}

/// Whole mebibytes in `bytes`, truncated. Zero-fill allocation counts blocks
/// of this unit.
pub fn to_mib(bytes: u64) -> u64 {
    bytes / MIB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_units() {
        assert_eq!(parse_size("8G").unwrap(), 8 * GIB);
        assert_eq!(parse_size("4096M").unwrap(), 4096 * MIB);
        assert_eq!(parse_size("64k").unwrap(), 64 * KIB);
    }

    #[test]
    fn test_parse_default_unit_is_mib() {
        assert_eq!(parse_size("512").unwrap(), 512 * MIB);
    }

    #[test]
    fn test_parse_suffix_first_letter_only() {
        assert_eq!(parse_size("2kb").unwrap(), parse_size("2ki").unwrap());
        assert_eq!(parse_size("2GB").unwrap(), 2 * GIB);
        assert_eq!(parse_size("2Gi").unwrap(), 2 * GIB);
        assert_eq!(parse_size("3mb").unwrap(), 3 * MIB);
    }

    #[test]
    fn test_parse_fraction_truncates() {
        assert_eq!(parse_size("1.5G").unwrap(), GIB + GIB / 2);
        assert_eq!(parse_size("0.5").unwrap(), MIB / 2);
        assert_eq!(to_mib(parse_size("1.9M").unwrap()), 1);
    }

    #[test]
    fn test_parse_whitespace_and_case() {
        assert_eq!(parse_size("  8 g ").unwrap(), 8 * GIB);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in ["", "   ", "0G", "0", "-1G", "abc", "8T", "8gbx", "G", "1.2.3M"] {
            assert!(parse_size(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_parse_monotonic_for_fixed_unit() {
        let mut last = 0;
        for n in 1..64 {
            let bytes = parse_size(&format!("{n}M")).unwrap();
            assert!(bytes > last);
            last = bytes;
        }
    }

    #[test]
    fn test_parse_error_message() {
        let err = parse_size("8T").unwrap_err();
        assert_eq!(err.input, "8T");
        assert!(err.to_string().contains("unknown unit"));
    }
}
