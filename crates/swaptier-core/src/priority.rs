//! Effective priority of a swap resource.
//!
//! Live kernel state wins; otherwise the persisted record (mount table for
//! files, generator section for zram devices); otherwise unknown.

use crate::config::{FstabStore, GeneratorStore};
use crate::fs::FileSystem;
use crate::probe::{ResourceProbe, SwapKind};

/// Lowest priority an operator can request; lower live values are assigned
/// by the kernel to resources activated without one.
pub const MIN_EXPLICIT_PRIORITY: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPriority {
    Live(i32),
    Persisted(i32),
    Unknown,
}

impl ResolvedPriority {
    pub fn value(&self) -> Option<i32> {
        match self {
            ResolvedPriority::Live(p) | ResolvedPriority::Persisted(p) => Some(*p),
            ResolvedPriority::Unknown => None,
        }
    }

    /// Priority to pass when reactivating. Kernel-assigned values cannot be
    /// requested explicitly, so they map to "no priority".
    pub fn for_activation(&self) -> Option<i32> {
        self.value().filter(|p| *p >= MIN_EXPLICIT_PRIORITY)
    }
}

pub struct PriorityResolver<'a, F: FileSystem> {
    probe: ResourceProbe<'a, F>,
    fstab: FstabStore<'a, F>,
    generator: GeneratorStore<'a, F>,
}

impl<'a, F: FileSystem> PriorityResolver<'a, F> {
    pub fn new(
        probe: ResourceProbe<'a, F>,
        fstab: FstabStore<'a, F>,
        generator: GeneratorStore<'a, F>,
    ) -> Self {
        Self {
            probe,
            fstab,
            generator,
        }
    }

    pub fn resolve(&self, identifier: &str) -> ResolvedPriority {
        if let Some(live) = self.probe.find(identifier) {
            return ResolvedPriority::Live(live.priority);
        }
        if let Some(p) = self.fstab.priority_of(identifier) {
            return ResolvedPriority::Persisted(p);
        }
        if SwapKind::of(identifier, "") == SwapKind::CompressedMemory {
            if let Some(p) = self.generator.section(identifier).and_then(|s| s.priority) {
                return ResolvedPriority::Persisted(p);
            }
        }
        ResolvedPriority::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorSection;
    use crate::exec::MockExecutor;
    use crate::host::testing::mock_host;
    use crate::size::GIB;

    #[test]
    fn test_live_priority_wins_over_persisted() {
        let (host, exec) = mock_host(MockExecutor::new().with_active_file("/swapfile", GIB, Some(10)));
        exec.fs()
            .add_file("/etc/fstab", "/swapfile none swap defaults,pri=3 0 0\n");

        assert_eq!(host.resolver().resolve("/swapfile"), ResolvedPriority::Live(10));
    }

    #[test]
    fn test_persisted_priority_when_inactive() {
        let (host, exec) = mock_host(MockExecutor::new());
        exec.fs()
            .add_file("/etc/fstab", "/swapfile none swap defaults,pri=3 0 0\n");

        assert_eq!(
            host.resolver().resolve("/swapfile"),
            ResolvedPriority::Persisted(3)
        );
        assert_eq!(host.resolver().resolve("/other"), ResolvedPriority::Unknown);
    }

    #[test]
    fn test_generator_priority_for_zram() {
        let (host, _exec) = mock_host(MockExecutor::new());
        host.generator()
            .upsert(GeneratorSection::new("zram1", 512, 80))
            .unwrap();

        assert_eq!(
            host.resolver().resolve("/dev/zram1"),
            ResolvedPriority::Persisted(80)
        );
    }

    #[test]
    fn test_kernel_assigned_priority_not_reapplied() {
        assert_eq!(ResolvedPriority::Live(-2).for_activation(), None);
        assert_eq!(ResolvedPriority::Live(-1).for_activation(), Some(-1));
        assert_eq!(ResolvedPriority::Persisted(5).for_activation(), Some(5));
        assert_eq!(ResolvedPriority::Unknown.for_activation(), None);
    }
}
