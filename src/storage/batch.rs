//! Unit-of-work overlay for store mutations.
//!
//! A batch caches every bucket it touches plus the index and day-set in
//! memory; reads during the batch observe the overlay, and `flush` persists
//! the touched buckets and the index/day-set exactly once. Dropping an
//! unflushed overlay leaves the backing store untouched.

use super::{KeyValueStore, StorageError};
use crate::constants::storage_keys;
use crate::models::Raffle;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// One day's persisted raffles, keyed by `postId`.
pub type Bucket = HashMap<String, Raffle>;

/// `postId -> dayKey` ownership index.
pub type Index = HashMap<String, String>;

/// Load and parse a persisted JSON value, treating a missing or malformed
/// entry as the empty default.
pub(crate) async fn load_json_soft<T: Default + DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> Result<T, StorageError> {
    match kv.get(key).await? {
        None => Ok(T::default()),
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(error) => {
                warn!(key, %error, "malformed persisted JSON; treating as empty");
                Ok(T::default())
            }
        },
    }
}

/// In-memory cache of touched state for one unit of work.
#[derive(Default)]
pub struct BatchOverlay {
    buckets: HashMap<String, Bucket>,
    touched: HashSet<String>,
    index: Option<Index>,
    day_set: Option<BTreeSet<String>>,
    dirty: bool,
}

impl BatchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay has at least one uncommitted mutation.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark a bucket as mutated so `flush` persists it.
    pub fn touch(&mut self, day_key: &str) {
        self.touched.insert(day_key.to_string());
        self.dirty = true;
    }

    /// Bucket for a day key, loading it into the overlay on first access.
    pub async fn bucket_mut(
        &mut self,
        kv: &dyn KeyValueStore,
        day_key: &str,
    ) -> Result<&mut Bucket, StorageError> {
        if !self.buckets.contains_key(day_key) {
            let loaded: Bucket = load_json_soft(kv, &storage_keys::bucket_key(day_key)).await?;
            self.buckets.insert(day_key.to_string(), loaded);
        }
        Ok(self
            .buckets
            .get_mut(day_key)
            .expect("bucket inserted above"))
    }

    /// Ownership index, loading it on first access.
    pub async fn index_mut(
        &mut self,
        kv: &dyn KeyValueStore,
    ) -> Result<&mut Index, StorageError> {
        if self.index.is_none() {
            self.index = Some(load_json_soft(kv, storage_keys::RAFFLE_INDEX).await?);
        }
        Ok(self.index.as_mut().expect("index loaded above"))
    }

    /// Day-set, loading it on first access.
    pub async fn day_set_mut(
        &mut self,
        kv: &dyn KeyValueStore,
    ) -> Result<&mut BTreeSet<String>, StorageError> {
        if self.day_set.is_none() {
            self.day_set = Some(load_json_soft(kv, storage_keys::RAFFLE_DAYS).await?);
        }
        Ok(self.day_set.as_mut().expect("day-set loaded above"))
    }

    /// Persist the touched buckets, then the index and day-set, each exactly
    /// once. Returns the touched day keys for the invalidation signal.
    pub async fn flush(self, kv: &dyn KeyValueStore) -> Result<Vec<String>, StorageError> {
        if !self.dirty {
            return Ok(Vec::new());
        }

        let mut touched: Vec<String> = self.touched.into_iter().collect();
        touched.sort();

        for day_key in &touched {
            let bucket = self
                .buckets
                .get(day_key)
                .expect("touched bucket is always loaded");
            let key = storage_keys::bucket_key(day_key);
            if bucket.is_empty() {
                kv.delete(&key).await?;
            } else {
                kv.set(&key, &serde_json::to_string(bucket)?).await?;
            }
        }

        if let Some(index) = &self.index {
            kv.set(storage_keys::RAFFLE_INDEX, &serde_json::to_string(index)?)
                .await?;
        }
        if let Some(day_set) = &self.day_set {
            kv.set(storage_keys::RAFFLE_DAYS, &serde_json::to_string(day_set)?)
                .await?;
        }

        Ok(touched)
    }
}
