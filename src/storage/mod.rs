//! # Persistence Layer
//!
//! Sharded raffle storage over a string key-value boundary. One bucket per
//! calendar day, a `postId -> dayKey` index as the single source of truth
//! for bucket ownership, and a day-set naming every non-empty bucket.
//!
//! The [`RaffleStore`] is the single-writer authority for all three; every
//! other component reads a copy, mutates it, and resubmits through
//! [`RaffleStore::put`]. Mutations go through a unit-of-work overlay
//! ([`batch`]) so a multi-step operation persists its touched buckets and
//! the index/day-set exactly once.

pub mod batch;
pub mod day_key;
pub mod kv;
pub mod maintenance;
pub mod raffle_store;

use thiserror::Error;

pub use day_key::{day_key_for, format_day_key};
pub use kv::{JsonFileKv, KeyValueStore, MemoryKv};
pub use maintenance::{Confirmation, MaintenanceOps, MaintenanceReport};
pub use raffle_store::{RaffleStore, StoreSnapshot};

/// Errors raised at the persistence boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key-value backend failed (I/O, corrupt file system state).
    #[error("key-value backend failure: {0}")]
    Backend(String),

    /// A domain object could not be serialized for persistence. Malformed
    /// *stored* data never raises this; it deserializes to an empty default.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `begin_batch` while a batch is already active.
    #[error("a mutation batch is already active")]
    BatchAlreadyActive,

    /// `flush` without an active batch.
    #[error("no active mutation batch to flush")]
    NoActiveBatch,
}
