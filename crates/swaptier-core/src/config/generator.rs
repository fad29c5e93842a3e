//! zram-generator configuration: one `[zramN]` section per device.
//!
//! ```text
//! [zram0]
//! zram-size = 2048
//! swap-priority = 100
//! ```
//!
//! The file is regenerated in full on every write. Keys other than size
//! and priority survive a rewrite, as do non-numeric size expressions.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::fs::FileSystem;

const SIZE_KEY: &str = "zram-size";
const PRIORITY_KEY: &str = "swap-priority";

/// Size of a generator device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GeneratorSize {
    Mib(u64),
    /// Expression evaluated by the generator, e.g. `min(ram / 2, 4096)`.
    Expr(String),
}

impl std::fmt::Display for GeneratorSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorSize::Mib(m) => write!(f, "{}", m),
            GeneratorSize::Expr(e) => write!(f, "{}", e),
        }
    }
}

/// One device section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorSection {
    /// Device name without `/dev/`, e.g. `zram0`.
    pub device: String,
    pub size: Option<GeneratorSize>,
    pub priority: Option<i32>,
    /// Other keys, in file order.
    pub extra: Vec<(String, String)>,
}

impl GeneratorSection {
    pub fn new(device: &str, size_mib: u64, priority: i32) -> Self {
        Self {
            device: device_name(device).to_string(),
            size: Some(GeneratorSize::Mib(size_mib)),
            priority: Some(priority),
            extra: Vec::new(),
        }
    }
}

/// `zram0` for `/dev/zram0` or `zram0`.
pub fn device_name(device: &str) -> &str {
    device.strip_prefix("/dev/").unwrap_or(device)
}

/// Systemd unit that sets up a generator-managed device.
pub fn setup_unit(device: &str) -> String {
    format!("systemd-zram-setup@{}.service", device_name(device))
}

/// Parses generator configuration. Comments and keys outside a section
/// are ignored.
pub fn parse_generator_config(content: &str) -> Vec<GeneratorSection> {
    let mut sections: Vec<GeneratorSection> = Vec::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            sections.retain(|s| s.device != name);
            sections.push(GeneratorSection {
                device: name.to_string(),
                size: None,
                priority: None,
                extra: Vec::new(),
            });
            continue;
        }
        let (Some(section), Some((key, value))) = (sections.last_mut(), line.split_once('='))
        else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            SIZE_KEY => {
                section.size = Some(match value.parse() {
                    Ok(mib) => GeneratorSize::Mib(mib),
                    Err(_) => GeneratorSize::Expr(value.to_string()),
                });
            }
            PRIORITY_KEY => section.priority = value.parse().ok(),
            _ => section.extra.push((key.to_string(), value.to_string())),
        }
    }
    sections
}

/// Renders sections in order.
pub fn render_generator_config(sections: &[GeneratorSection]) -> String {
    let mut out = String::from("# Managed by swaptier\n");
    for section in sections {
        out.push_str(&format!("\n[{}]\n", section.device));
        if let Some(size) = &section.size {
            out.push_str(&format!("{} = {}\n", SIZE_KEY, size));
        }
        if let Some(priority) = section.priority {
            out.push_str(&format!("{} = {}\n", PRIORITY_KEY, priority));
        }
        for (key, value) in &section.extra {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }
    out
}

/// Reader/writer of the generator configuration.
pub struct GeneratorStore<'a, F: FileSystem> {
    fs: &'a F,
    path: &'a Path,
    binaries: &'a [PathBuf],
}

impl<'a, F: FileSystem> GeneratorStore<'a, F> {
    pub fn new(fs: &'a F, path: &'a Path, binaries: &'a [PathBuf]) -> Self {
        Self { fs, path, binaries }
    }

    /// Whether a generator is installed to consume the configuration.
    pub fn is_available(&self) -> bool {
        self.binaries.iter().any(|b| self.fs.exists(b))
    }

    pub fn sections(&self) -> io::Result<Vec<GeneratorSection>> {
        match self.fs.read_to_string(self.path) {
            Ok(content) => Ok(parse_generator_config(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub fn section(&self, device: &str) -> Option<GeneratorSection> {
        let name = device_name(device);
        self.sections()
            .ok()?
            .into_iter()
            .find(|s| s.device == name)
    }

    /// Writes `section`, replacing any section for the same device. Keys the
    /// new section does not set are carried over from the old one.
    pub fn upsert(&self, mut section: GeneratorSection) -> io::Result<()> {
        let mut sections = self.sections()?;
        if let Some(pos) = sections.iter().position(|s| s.device == section.device) {
            let old = sections.remove(pos);
            if section.extra.is_empty() {
                section.extra = old.extra;
            }
            sections.insert(pos, section.clone());
        } else {
            sections.push(section.clone());
        }
        self.fs
            .write(self.path, &render_generator_config(&sections))?;
        info!(
            "{}: generator section written (size {}, priority {})",
            section.device,
            section
                .size
                .as_ref()
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            section
                .priority
                .map_or_else(|| "-".to_string(), |p| p.to_string())
        );
        Ok(())
    }

    /// Drops the section for `device`; deletes the file when none remain.
    /// Returns whether a section was removed.
    pub fn remove(&self, device: &str) -> io::Result<bool> {
        let name = device_name(device);
        let mut sections = self.sections()?;
        let before = sections.len();
        sections.retain(|s| s.device != name);
        if sections.len() == before {
            return Ok(false);
        }
        if sections.is_empty() {
            self.fs.remove_file(self.path)?;
        } else {
            self.fs
                .write(self.path, &render_generator_config(&sections))?;
        }
        info!("{}: generator section removed", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFs;

    const CONF: &str = "\
# distro default
[zram0]
zram-size = min(ram / 2, 4096)
compression-algorithm = zstd

[zram1]
zram-size = 1024
swap-priority = 50
";

    fn binaries() -> Vec<PathBuf> {
        vec![PathBuf::from(
            "/usr/lib/systemd/system-generators/zram-generator",
        )]
    }

    #[test]
    fn test_parse_sections() {
        let sections = parse_generator_config(CONF);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].size,
            Some(GeneratorSize::Expr("min(ram / 2, 4096)".to_string()))
        );
        assert_eq!(sections[0].priority, None);
        assert_eq!(
            sections[0].extra,
            vec![("compression-algorithm".to_string(), "zstd".to_string())]
        );
        assert_eq!(sections[1].size, Some(GeneratorSize::Mib(1024)));
        assert_eq!(sections[1].priority, Some(50));
    }

    #[test]
    fn test_upsert_regenerates_and_keeps_extra_keys() {
        let fs = MockFs::new();
        fs.add_file("/etc/systemd/zram-generator.conf", CONF);
        let bins = binaries();
        let store = GeneratorStore::new(&fs, Path::new("/etc/systemd/zram-generator.conf"), &bins);

        store
            .upsert(GeneratorSection::new("/dev/zram0", 2048, 100))
            .unwrap();
        store
            .upsert(GeneratorSection::new("zram0", 2048, 100))
            .unwrap();

        let sections = store.sections().unwrap();
        assert_eq!(sections.len(), 2);
        let zram0 = store.section("/dev/zram0").unwrap();
        assert_eq!(zram0.size, Some(GeneratorSize::Mib(2048)));
        assert_eq!(zram0.priority, Some(100));
        assert_eq!(zram0.extra.len(), 1);

        let text = fs.contents("/etc/systemd/zram-generator.conf").unwrap();
        assert_eq!(text.matches("[zram0]").count(), 1);
        assert!(text.contains("swap-priority = 100"));
    }

    #[test]
    fn test_remove_last_section_deletes_file() {
        let fs = MockFs::new();
        let bins = binaries();
        let path = Path::new("/etc/systemd/zram-generator.conf");
        let store = GeneratorStore::new(&fs, path, &bins);

        assert!(!store.is_available());
        fs.add_file("/usr/lib/systemd/system-generators/zram-generator", "");
        assert!(store.is_available());

        store.upsert(GeneratorSection::new("zram0", 512, 100)).unwrap();
        assert!(store.remove("/dev/zram0").unwrap());
        assert!(!fs.exists(path));
        assert!(!store.remove("zram0").unwrap());
    }

    #[test]
    fn test_setup_unit_name() {
        assert_eq!(setup_unit("/dev/zram0"), "systemd-zram-setup@zram0.service");
    }
}
