//! Persisted swap entries in the mount table.
//!
//! Entries have the form `<identifier> none swap <options> 0 0`. Every
//! mutation reads the whole record, drops the lines for the identifier,
//! appends the replacement and writes the whole record back, so at most
//! one entry per identifier survives any sequence of updates.

use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::fs::FileSystem;

/// Leading option token of every entry this store writes.
pub const BASE_OPTIONS: &str = "defaults";

static PRI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|,)pri=(-?\d+)(?:,|$)").expect("pri pattern is valid"));

/// One swap line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedEntry {
    pub identifier: String,
    pub options: String,
}

impl PersistedEntry {
    /// Value of the `pri=<N>` option, if present.
    pub fn priority(&self) -> Option<i32> {
        priority_option(&self.options)
    }
}

/// Extracts `pri=<N>` from a comma-joined option list.
pub fn priority_option(options: &str) -> Option<i32> {
    PRI_RE.captures(options)?.get(1)?.as_str().parse().ok()
}

/// Renders the options for an entry with an optional priority.
pub fn render_options(priority: Option<i32>) -> String {
    match priority {
        Some(p) => format!("{},pri={}", BASE_OPTIONS, p),
        None => BASE_OPTIONS.to_string(),
    }
}

/// Whether `line` is an entry for `identifier` (first field, comments excluded).
fn references(line: &str, identifier: &str) -> bool {
    let line = line.trim_start();
    !line.starts_with('#') && line.split_whitespace().next() == Some(identifier)
}

fn parse_entry(line: &str) -> Option<PersistedEntry> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 || fields[2] != "swap" {
        return None;
    }
    Some(PersistedEntry {
        identifier: fields[0].to_string(),
        options: fields[3].to_string(),
    })
}

/// Reader/writer of swap entries in the mount table.
pub struct FstabStore<'a, F: FileSystem> {
    fs: &'a F,
    path: &'a Path,
}

impl<'a, F: FileSystem> FstabStore<'a, F> {
    pub fn new(fs: &'a F, path: &'a Path) -> Self {
        Self { fs, path }
    }

    fn read(&self) -> io::Result<String> {
        match self.fs.read_to_string(self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            other => other,
        }
    }

    /// Every swap entry, in file order.
    pub fn entries(&self) -> io::Result<Vec<PersistedEntry>> {
        Ok(self.read()?.lines().filter_map(parse_entry).collect())
    }

    pub fn entry_for(&self, identifier: &str) -> io::Result<Option<PersistedEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.identifier == identifier))
    }

    /// Persisted priority of `identifier`; unreadable records count as absent.
    pub fn priority_of(&self, identifier: &str) -> Option<i32> {
        self.entry_for(identifier).ok().flatten()?.priority()
    }

    /// Number of lines referencing `identifier`.
    pub fn count_for(&self, identifier: &str) -> io::Result<usize> {
        Ok(self
            .read()?
            .lines()
            .filter(|line| references(line, identifier))
            .count())
    }

    /// Replaces every entry for `identifier` with one fresh entry.
    pub fn replace(&self, identifier: &str, priority: Option<i32>) -> io::Result<()> {
        let content = self.read()?;
        let mut lines: Vec<&str> = content
            .lines()
            .filter(|line| !references(line, identifier))
            .collect();
        let entry = format!(
            "{} none swap {} 0 0",
            identifier,
            render_options(priority)
        );
        lines.push(&entry);
        self.write_lines(&lines)?;
        info!("{}: persisted ({})", identifier, render_options(priority));
        Ok(())
    }

    /// Removes every entry for `identifier`; returns how many were removed.
    pub fn remove(&self, identifier: &str) -> io::Result<usize> {
        let content = self.read()?;
        let total = content.lines().count();
        let lines: Vec<&str> = content
            .lines()
            .filter(|line| !references(line, identifier))
            .collect();
        let removed = total - lines.len();
        if removed > 0 {
            self.write_lines(&lines)?;
            info!("{}: removed {} persisted line(s)", identifier, removed);
        }
        Ok(removed)
    }

    fn write_lines(&self, lines: &[&str]) -> io::Result<()> {
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        self.fs.write(self.path, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFs;

    const FSTAB: &str = "\
# /etc/fstab
UUID=abcd / ext4 defaults 0 1
/swapfile none swap defaults,pri=5 0 0
/swapfile2 none swap sw 0 0
# /swapfile none swap defaults 0 0
";

    fn store(fs: &MockFs) -> FstabStore<'_, MockFs> {
        FstabStore::new(fs, Path::new("/etc/fstab"))
    }

    #[test]
    fn test_entries_and_priority() {
        let fs = MockFs::new();
        fs.add_file("/etc/fstab", FSTAB);
        let store = store(&fs);

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(store.priority_of("/swapfile"), Some(5));
        assert_eq!(store.priority_of("/swapfile2"), None);
        assert_eq!(store.priority_of("/missing"), None);
    }

    #[test]
    fn test_priority_option_parsing() {
        assert_eq!(priority_option("defaults,pri=-1"), Some(-1));
        assert_eq!(priority_option("pri=10,discard"), Some(10));
        assert_eq!(priority_option("defaults,xpri=3"), None);
        assert_eq!(priority_option("defaults"), None);
    }

    #[test]
    fn test_replace_keeps_exactly_one_entry() {
        let fs = MockFs::new();
        fs.add_file("/etc/fstab", FSTAB);
        let store = store(&fs);

        store.replace("/swapfile", Some(-1)).unwrap();
        store.replace("/swapfile", Some(7)).unwrap();
        store.replace("/swapfile", None).unwrap();

        assert_eq!(store.count_for("/swapfile").unwrap(), 1);
        assert_eq!(store.priority_of("/swapfile"), None);
        let content = fs.contents("/etc/fstab").unwrap();
        assert!(content.contains("UUID=abcd / ext4 defaults 0 1"));
        assert!(content.contains("/swapfile2 none swap sw 0 0"));
        assert!(content.contains("# /swapfile none swap defaults 0 0"));
        assert!(content.ends_with("/swapfile none swap defaults 0 0\n"));
    }

    #[test]
    fn test_replace_creates_missing_record() {
        let fs = MockFs::new();
        let store = store(&fs);
        store.replace("/swapfile", Some(-1)).unwrap();
        assert_eq!(
            fs.contents("/etc/fstab").unwrap(),
            "/swapfile none swap defaults,pri=-1 0 0\n"
        );
    }

    #[test]
    fn test_remove_matches_whole_identifier() {
        let fs = MockFs::new();
        fs.add_file("/etc/fstab", FSTAB);
        let store = store(&fs);

        assert_eq!(store.remove("/swapfile").unwrap(), 1);
        assert_eq!(store.count_for("/swapfile").unwrap(), 0);
        assert_eq!(store.count_for("/swapfile2").unwrap(), 1);
        assert_eq!(store.remove("/swapfile").unwrap(), 0);
    }
}
