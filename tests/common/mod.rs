//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from a suite's main.rs.

#![allow(dead_code)]

use histmeta::{HistoryMetadata, ManualClock, MetadataConfig, Timestamp};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Configuration with the `always` durability mode.
pub fn always_config() -> MetadataConfig {
    MetadataConfig {
        durability: "always".to_string(),
        ..MetadataConfig::default()
    }
}

/// In-memory store driven by a manual clock starting at `start_ms`.
pub fn manual_store(start_ms: i64) -> (HistoryMetadata, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(start_ms)));
    let store = HistoryMetadata::in_memory_with_clock(clock.clone()).expect("in-memory store");
    (store, clock)
}

/// On-disk store in a fresh temp dir, with a manual clock.
pub struct TestStore {
    pub store: HistoryMetadata,
    pub clock: Arc<ManualClock>,
    pub dir: TempDir,
    config: MetadataConfig,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_config(always_config())
    }

    pub fn with_config(config: MetadataConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let clock = Arc::new(ManualClock::new(Timestamp::EPOCH));
        let store = HistoryMetadata::open_with(dir.path(), config.clone(), clock.clone())
            .expect("open store");
        Self {
            store,
            clock,
            dir,
            config,
        }
    }

    /// Close the store and open the same directory again.
    pub fn reopen(&mut self) {
        self.store.close().expect("close store");
        self.store = HistoryMetadata::open_with(self.dir.path(), self.config.clone(), self.clock.clone())
            .expect("reopen store");
    }
}
