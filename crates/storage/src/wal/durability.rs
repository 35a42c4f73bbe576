//! Durability mode for WAL operations.
//!
//! Defines when appended entries are fsynced to disk.

/// Durability mode for WAL writes.
///
/// # Mode Comparison
///
/// | Mode | fsync | Use Case |
/// |------|-------|----------|
/// | InMemory | no file at all | Tests, ephemeral stores |
/// | Cache | never (OS decides) | Integration tests, rebuildable data |
/// | Standard | every N entries or T ms | Production (balanced) |
/// | Always | every entry | Zero-loss deployments |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// No persistence - all data lost when the store is dropped.
    InMemory,

    /// Entries are written to the file but never explicitly fsynced.
    Cache,

    /// fsync every `batch_size` entries OR every `interval_ms` milliseconds.
    ///
    /// May lose up to one batch of entries on power loss.
    Standard {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum entries between fsyncs
        batch_size: usize,
    },

    /// fsync after every entry.
    Always,
}

impl DurabilityMode {
    /// Check if this mode writes a log file.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::InMemory)
    }

    /// Check if this mode fsyncs every entry.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::InMemory => "No persistence (all data lost on drop)",
            DurabilityMode::Cache => "Written, never fsynced (fast, OS-buffered)",
            DurabilityMode::Standard { .. } => "Periodic fsync (balanced speed/safety)",
            DurabilityMode::Always => "fsync every entry (safest, slowest)",
        }
    }

    /// Standard mode with recommended defaults.
    ///
    /// Returns `Standard { interval_ms: 100, batch_size: 1000 }`.
    pub fn standard_default() -> Self {
        DurabilityMode::Standard {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::standard_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inmemory_mode() {
        let mode = DurabilityMode::InMemory;
        assert!(!mode.requires_wal());
        assert!(!mode.requires_immediate_fsync());
    }

    #[test]
    fn test_always_mode() {
        let mode = DurabilityMode::Always;
        assert!(mode.requires_wal());
        assert!(mode.requires_immediate_fsync());
    }

    #[test]
    fn test_cache_mode() {
        let mode = DurabilityMode::Cache;
        assert!(mode.requires_wal());
        assert!(!mode.requires_immediate_fsync());
    }

    #[test]
    fn test_default_is_standard() {
        match DurabilityMode::default() {
            DurabilityMode::Standard {
                interval_ms,
                batch_size,
            } => {
                assert_eq!(interval_ms, 100);
                assert_eq!(batch_size, 1000);
            }
            other => panic!("Expected Standard mode, got {:?}", other),
        }
    }
}
