//! Live swap state from the kernel's accounting table (`/proc/swaps`).

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::fs::FileSystem;
use crate::size::KIB;

/// Substring identifying compressed-memory (zram) devices.
pub const ZRAM_MARKER: &str = "/zram";

/// Backend kind of a swap resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapKind {
    FileBacked,
    CompressedMemory,
    Other,
}

impl SwapKind {
    /// Kind of an identifier given the table's type column.
    pub fn of(identifier: &str, kind_field: &str) -> Self {
        if identifier.contains(ZRAM_MARKER) {
            SwapKind::CompressedMemory
        } else if kind_field.eq_ignore_ascii_case("file") {
            SwapKind::FileBacked
        } else {
            SwapKind::Other
        }
    }
}

impl std::fmt::Display for SwapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapKind::FileBacked => write!(f, "file"),
            SwapKind::CompressedMemory => write!(f, "zram"),
            SwapKind::Other => write!(f, "other"),
        }
    }
}

/// One row of the live table. Stale as soon as any activation or
/// deactivation happens; re-probe after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapResource {
    pub identifier: String,
    pub kind: SwapKind,
    pub capacity_bytes: u64,
    pub used_bytes: u64,
    pub priority: i32,
}

/// Parses `/proc/swaps` content.
///
/// The first line is a header. Rows with fewer than five fields,
/// non-numeric columns or sizes beyond `u64` bytes are skipped.
pub fn parse_proc_swaps(content: &str) -> Vec<SwapResource> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            let capacity_kib: u64 = fields[2].parse().ok()?;
            let used_kib: u64 = fields[3].parse().ok()?;
            let priority: i32 = fields[4].parse().ok()?;
            Some(SwapResource {
                identifier: fields[0].to_string(),
                kind: SwapKind::of(fields[0], fields[1]),
                capacity_bytes: capacity_kib.checked_mul(KIB)?,
                used_bytes: used_kib.min(capacity_kib).checked_mul(KIB)?,
                priority,
            })
        })
        .collect()
}

/// Identifiers of live resources grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub compressed_memory: Vec<String>,
    pub file_backed: Vec<String>,
    pub other: Vec<String>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.compressed_memory.is_empty() && self.file_backed.is_empty() && self.other.is_empty()
    }

    pub fn kind_of(&self, identifier: &str) -> Option<SwapKind> {
        let has = |ids: &[String]| ids.iter().any(|id| id == identifier);
        if has(&self.compressed_memory) {
            Some(SwapKind::CompressedMemory)
        } else if has(&self.file_backed) {
            Some(SwapKind::FileBacked)
        } else if has(&self.other) {
            Some(SwapKind::Other)
        } else {
            None
        }
    }

    /// Every identifier, compressed-memory first.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.compressed_memory
            .iter()
            .chain(&self.file_backed)
            .chain(&self.other)
    }
}

/// Reads live swap state.
pub struct ResourceProbe<'a, F: FileSystem> {
    fs: &'a F,
    table: &'a Path,
}

impl<'a, F: FileSystem> ResourceProbe<'a, F> {
    pub fn new(fs: &'a F, table: &'a Path) -> Self {
        Self { fs, table }
    }

    /// Lists active resources. A missing or unreadable table means no swap.
    pub fn list_active(&self) -> Vec<SwapResource> {
        match self.fs.read_to_string(self.table) {
            Ok(content) => parse_proc_swaps(&content),
            Err(e) => {
                debug!("{}: {}; assuming no active swap", self.table.display(), e);
                Vec::new()
            }
        }
    }

    pub fn find(&self, identifier: &str) -> Option<SwapResource> {
        self.list_active()
            .into_iter()
            .find(|r| r.identifier == identifier)
    }

    pub fn is_active(&self, identifier: &str) -> bool {
        self.find(identifier).is_some()
    }

    pub fn classify(&self) -> Classification {
        classify(&self.list_active())
    }
}

/// Groups resources by kind, preserving table order.
pub fn classify(resources: &[SwapResource]) -> Classification {
    let mut out = Classification::default();
    for r in resources {
        let bucket = match r.kind {
            SwapKind::CompressedMemory => &mut out.compressed_memory,
            SwapKind::FileBacked => &mut out.file_backed,
            SwapKind::Other => &mut out.other,
        };
        bucket.push(r.identifier.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFs;

    const TABLE: &str = "\
Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/swapfile                               file\t\t8388604\t\t1024\t\t-2
/dev/zram0                              partition\t2097148\t\t0\t\t100
/dev/sda2                               partition\t1048572\t\t0\t\t-3
";

    #[test]
    fn test_parse_proc_swaps() {
        let swaps = parse_proc_swaps(TABLE);
        assert_eq!(swaps.len(), 3);
        assert_eq!(swaps[0].identifier, "/swapfile");
        assert_eq!(swaps[0].kind, SwapKind::FileBacked);
        assert_eq!(swaps[0].capacity_bytes, 8388604 * 1024);
        assert_eq!(swaps[0].used_bytes, 1024 * 1024);
        assert_eq!(swaps[0].priority, -2);
        assert_eq!(swaps[1].kind, SwapKind::CompressedMemory);
        assert_eq!(swaps[1].priority, 100);
        assert_eq!(swaps[2].kind, SwapKind::Other);
    }

    #[test]
    fn test_parse_skips_short_and_garbage_rows() {
        let content = "header\n/swapfile file 100\n/ok FILE 10 5 3\n/bad file x 0 0\n";
        let swaps = parse_proc_swaps(content);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].identifier, "/ok");
        assert_eq!(swaps[0].kind, SwapKind::FileBacked);
    }

    #[test]
    fn test_used_never_exceeds_capacity() {
        let swaps = parse_proc_swaps("h\n/swapfile file 10 20 0\n");
        assert_eq!(swaps[0].used_bytes, swaps[0].capacity_bytes);
    }

    #[test]
    fn test_oversized_row_is_skipped() {
        let content = format!("h\n/huge file {} 0 -2\n/swapfile file 1024 0 -3\n", u64::MAX);
        let swaps = parse_proc_swaps(&content);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].identifier, "/swapfile");
        assert_eq!(swaps[0].capacity_bytes, 1024 * KIB);
    }

    #[test]
    fn test_list_active_absent_or_empty_table() {
        let fs = MockFs::new();
        let probe = ResourceProbe::new(&fs, Path::new("/proc/swaps"));
        assert!(probe.list_active().is_empty());

        fs.add_file("/proc/swaps", "");
        assert!(probe.list_active().is_empty());

        fs.add_file("/proc/swaps", "Filename Type Size Used Priority\n");
        assert!(probe.list_active().is_empty());
    }

    #[test]
    fn test_classify() {
        let fs = MockFs::new();
        fs.add_file(
            "/proc/swaps",
            "Filename Type Size Used Priority\n/swapfile file 1024 0 -2\n/dev/zram0 partition 1024 0 100\n",
        );
        let probe = ResourceProbe::new(&fs, Path::new("/proc/swaps"));
        let c = probe.classify();
        assert_eq!(c.file_backed, vec!["/swapfile".to_string()]);
        assert_eq!(c.compressed_memory, vec!["/dev/zram0".to_string()]);
        assert!(c.other.is_empty());
        assert_eq!(c.kind_of("/dev/zram0"), Some(SwapKind::CompressedMemory));
        assert_eq!(c.kind_of("/nope"), None);
        assert!(probe.is_active("/swapfile"));
    }
}
