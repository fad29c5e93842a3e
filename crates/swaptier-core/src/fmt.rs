//! Shared formatting helpers for log lines and CLI reports.
//!
//! Functions that differ between compact table columns and verbose
//! messages are parameterized via [`FmtStyle`].

/// Controls compact (table columns) vs verbose (messages) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, short suffixes ("1.5G")
    Compact,
    /// Detail: spaces, full suffixes ("1.5 GiB")
    Detail,
}

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.5 GiB"`, `"100.3 MiB"`, `"50.0 KiB"`, `"512 B"`
pub fn format_bytes(bytes: u64, style: FmtStyle) -> String {
    let (g, m, k, b) = match style {
        FmtStyle::Compact => ("G", "M", "K", "B"),
        FmtStyle::Detail => (" GiB", " MiB", " KiB", " B"),
    };
    let f = bytes as f64;
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}{}", f / (1024.0 * 1024.0 * 1024.0), g)
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}{}", f / (1024.0 * 1024.0), m)
    } else if bytes >= 1024 {
        format!("{:.1}{}", f / 1024.0, k)
    } else {
        format!("{}{}", bytes, b)
    }
}

/// Share of `capacity` in use, `"-"` for an empty resource.
pub fn format_usage(used: u64, capacity: u64) -> String {
    if capacity == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", used as f64 * 100.0 / capacity as f64)
}

/// Priority for display; `None` means the kernel picks one.
pub fn format_priority(priority: Option<i32>) -> String {
    priority.map_or_else(|| "kernel default".to_string(), |p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_styles() {
        assert_eq!(format_bytes(8 * 1024 * 1024 * 1024, FmtStyle::Detail), "8.0 GiB");
        assert_eq!(format_bytes(1536 * 1024 * 1024, FmtStyle::Compact), "1.5G");
        assert_eq!(format_bytes(512 * 1024, FmtStyle::Detail), "512.0 KiB");
        assert_eq!(format_bytes(100, FmtStyle::Compact), "100B");
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(format_usage(0, 0), "-");
        assert_eq!(format_usage(1, 4), "25.0%");
    }

    #[test]
    fn test_format_priority() {
        assert_eq!(format_priority(None), "kernel default");
        assert_eq!(format_priority(Some(-1)), "-1");
    }
}
