//! Storage layer for histmeta
//!
//! This crate implements the durable keyed store the engine builds on:
//! - DurableStore: ordered `MetadataKey → MetadataRecord` map under one RwLock
//! - ObservedIndex: `last_observed_at → keys` for range scans and retention
//! - WAL: append-only log with CRC32-framed MessagePack entries
//! - Durability modes: InMemory, Cache, Standard, Always
//! - Replay on open, torn-tail truncation, log compaction
//!
//! # Write discipline
//!
//! There is exactly one writer slot (`DurableStore::begin_write`). A write is
//! appended to the log first, then applied to memory under the write lock, so
//! readers observe either none or all of it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod store;
pub mod wal;

pub use error::WalError;
pub use index::ObservedIndex;
pub use store::{DurableStore, Snapshot, StorageOptions, StoreState, WriteGuard, LOCK_FILE_NAME};
pub use wal::{
    DurabilityMode, ReadStopReason, WalCounters, WalEntry, WalReadResult, WalReader, WalWriter,
    WAL_FILE_NAME,
};
