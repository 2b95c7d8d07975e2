//! # Raffle Store
//!
//! Single-writer authority for buckets, index, and day-set. Every mutation
//! is an idempotent upsert keyed by `postId`: repeating the same `put` is a
//! no-op against the invariants, which is what makes the brief dual-writer
//! window during scheduler handoff tolerable.
//!
//! Without an explicit batch, `put`/`remove` auto-create a one-shot batch
//! and flush immediately. Crash safety is prioritized over
//! write-amplification: a process interruption must never lose
//! already-fetched gateway data.

use super::batch::{load_json_soft, BatchOverlay, Bucket, Index};
use super::day_key::day_key_for;
use super::{KeyValueStore, StorageError};
use crate::config::StorageConfig;
use crate::constants::{is_millisecond_range, storage_keys};
use crate::error::{Result, TrackerError};
use crate::events::StoreEventPublisher;
use crate::models::Raffle;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Read-only copy of the full persisted store state. Used by the auditor
/// and the maintenance export; reads the backing store directly, bypassing
/// any active batch overlay.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub index: Index,
    pub day_set: BTreeSet<String>,
    pub buckets: BTreeMap<String, Bucket>,
}

/// Sharded persistent raffle store.
pub struct RaffleStore {
    kv: Arc<dyn KeyValueStore>,
    config: StorageConfig,
    events: StoreEventPublisher,
    batch: Mutex<Option<BatchOverlay>>,
}

impl RaffleStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self {
        Self {
            kv,
            config,
            events: StoreEventPublisher::default(),
            batch: Mutex::new(None),
        }
    }

    /// Publisher carrying the post-batch invalidation signal for read-side
    /// collaborators.
    pub fn events(&self) -> &StoreEventPublisher {
        &self.events
    }

    /// Fetch a raffle by its `postId`. Index lookup, then one bucket read.
    pub async fn get(&self, post_id: &str) -> Result<Option<Raffle>> {
        let mut guard = self.batch.lock().await;
        match guard.as_mut() {
            Some(overlay) => self.get_in(overlay, post_id).await,
            None => {
                let mut view = BatchOverlay::new();
                self.get_in(&mut view, post_id).await
            }
        }
    }

    /// Insert or update a raffle, migrating it between day buckets when its
    /// recomputed day key changed. Returns the stored copy.
    pub async fn put(&self, raffle: Raffle) -> Result<Raffle> {
        let mut guard = self.batch.lock().await;
        match guard.as_mut() {
            Some(overlay) => self.put_in(overlay, raffle).await,
            None => {
                let mut overlay = BatchOverlay::new();
                let stored = self.put_in(&mut overlay, raffle).await?;
                let touched = overlay.flush(&*self.kv).await.map_err(TrackerError::from)?;
                self.events.publish_invalidated(&touched);
                Ok(stored)
            }
        }
    }

    /// Delete a raffle from its bucket and the index, pruning an emptied
    /// day key. Returns whether anything was removed.
    pub async fn remove(&self, post_id: &str) -> Result<bool> {
        let mut guard = self.batch.lock().await;
        match guard.as_mut() {
            Some(overlay) => self.remove_in(overlay, post_id).await,
            None => {
                let mut overlay = BatchOverlay::new();
                let removed = self.remove_in(&mut overlay, post_id).await?;
                let touched = overlay.flush(&*self.kv).await.map_err(TrackerError::from)?;
                self.events.publish_invalidated(&touched);
                Ok(removed)
            }
        }
    }

    /// All raffles owned by one day key, ordered by `postId`.
    pub async fn list_by_day(&self, day_key: &str) -> Result<Vec<Raffle>> {
        let mut guard = self.batch.lock().await;
        let mut view = BatchOverlay::new();
        let overlay = guard.as_mut().unwrap_or(&mut view);
        let bucket = overlay.bucket_mut(&*self.kv, day_key).await?;
        let mut raffles: Vec<Raffle> = bucket.values().cloned().collect();
        raffles.sort_by(|a, b| a.post_id.cmp(&b.post_id));
        Ok(raffles)
    }

    /// Day keys that currently own at least one raffle, ascending.
    pub async fn list_day_keys(&self) -> Result<Vec<String>> {
        let mut guard = self.batch.lock().await;
        let mut view = BatchOverlay::new();
        let overlay = guard.as_mut().unwrap_or(&mut view);
        let day_set = overlay.day_set_mut(&*self.kv).await?;
        Ok(day_set.iter().cloned().collect())
    }

    /// All raffles across the inclusive `[start, end]` day-key range.
    pub async fn list_range(&self, start: &str, end: &str) -> Result<Vec<Raffle>> {
        let day_keys = self.list_day_keys().await?;
        let mut raffles = Vec::new();
        for day_key in day_keys {
            if day_key.as_str() >= start && day_key.as_str() <= end {
                raffles.extend(self.list_by_day(&day_key).await?);
            }
        }
        Ok(raffles)
    }

    /// Open an explicit unit of work. Reads and writes until `flush` hit the
    /// in-memory overlay only.
    pub async fn begin_batch(&self) -> Result<()> {
        let mut guard = self.batch.lock().await;
        if guard.is_some() {
            return Err(StorageError::BatchAlreadyActive.into());
        }
        *guard = Some(BatchOverlay::new());
        Ok(())
    }

    /// Persist the active batch: touched buckets plus index/day-set, once.
    /// Publishes the invalidation signal and returns the touched day keys.
    pub async fn flush(&self) -> Result<Vec<String>> {
        let overlay = {
            let mut guard = self.batch.lock().await;
            guard.take().ok_or(StorageError::NoActiveBatch)?
        };
        let touched = overlay.flush(&*self.kv).await.map_err(TrackerError::from)?;
        debug!(touched = touched.len(), "mutation batch flushed");
        self.events.publish_invalidated(&touched);
        Ok(touched)
    }

    /// Drop the active batch without persisting anything.
    pub async fn abort_batch(&self) -> Result<()> {
        let mut guard = self.batch.lock().await;
        if guard.take().is_none() {
            return Err(StorageError::NoActiveBatch.into());
        }
        Ok(())
    }

    /// Direct read of the entire persisted state, bypassing any overlay.
    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        let index: Index = load_json_soft(&*self.kv, storage_keys::RAFFLE_INDEX).await?;
        let day_set: BTreeSet<String> =
            load_json_soft(&*self.kv, storage_keys::RAFFLE_DAYS).await?;

        // Audit wants buckets the day-set may have lost track of, so walk
        // the union of both sources of day keys.
        let mut days: BTreeSet<String> = day_set.clone();
        days.extend(index.values().cloned());

        let mut buckets = BTreeMap::new();
        for day_key in days {
            let bucket: Bucket =
                load_json_soft(&*self.kv, &storage_keys::bucket_key(&day_key)).await?;
            if !bucket.is_empty() || day_set.contains(&day_key) {
                buckets.insert(day_key, bucket);
            }
        }
        Ok(StoreSnapshot {
            index,
            day_set,
            buckets,
        })
    }

    /// Append one line to the day's scan journal, keeping at most the
    /// configured number of lines.
    pub async fn append_journal(&self, day_key: &str, line: &str) -> Result<()> {
        let key = storage_keys::journal_key(day_key);
        let mut lines: Vec<String> = load_json_soft(&*self.kv, &key).await?;
        lines.push(format!("{} {line}", Utc::now().format("%H:%M:%S")));
        let max = self.config.journal_max_lines;
        if max > 0 && lines.len() > max {
            let excess = lines.len() - max;
            lines.drain(..excess);
        }
        self.kv
            .set(&key, &serde_json::to_string(&lines).map_err(StorageError::from)?)
            .await
            .map_err(TrackerError::from)?;
        Ok(())
    }

    /// Append a journal line under today's day key, computed with the
    /// store's configured offset.
    pub async fn append_journal_today(&self, line: &str) -> Result<()> {
        let day_key = super::day_key::format_day_key(
            Utc::now().timestamp(),
            self.config.day_key_utc_offset_minutes,
        );
        self.append_journal(&day_key, line).await
    }

    /// The day's scan journal lines, oldest first.
    pub async fn journal(&self, day_key: &str) -> Result<Vec<String>> {
        let key = storage_keys::journal_key(day_key);
        Ok(load_json_soft(&*self.kv, &key).await?)
    }

    /// Persisted timestamp of the last completed discovery run.
    pub async fn last_discovery_at(&self) -> Result<Option<i64>> {
        match self.kv.get(storage_keys::LAST_DISCOVERY_AT).await.map_err(TrackerError::from)? {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(ts) => Ok(Some(ts)),
                Err(_) => {
                    warn!(value = %raw, "malformed last-discovery timestamp; ignoring");
                    Ok(None)
                }
            },
        }
    }

    pub async fn set_last_discovery_at(&self, timestamp: i64) -> Result<()> {
        self.kv
            .set(storage_keys::LAST_DISCOVERY_AT, &timestamp.to_string())
            .await
            .map_err(TrackerError::from)?;
        Ok(())
    }

    async fn get_in(&self, overlay: &mut BatchOverlay, post_id: &str) -> Result<Option<Raffle>> {
        let day_key = {
            let index = overlay.index_mut(&*self.kv).await?;
            match index.get(post_id) {
                Some(day) => day.clone(),
                None => return Ok(None),
            }
        };
        let bucket = overlay.bucket_mut(&*self.kv, &day_key).await?;
        Ok(bucket.get(post_id).cloned())
    }

    async fn put_in(&self, overlay: &mut BatchOverlay, mut raffle: Raffle) -> Result<Raffle> {
        if raffle.post_id.trim().is_empty() {
            return Err(TrackerError::Validation(
                "put requires a non-empty postId".into(),
            ));
        }

        let now = Utc::now().timestamp();
        raffle.updated_at = Some(now);
        raffle.created_at.get_or_insert(now);
        raffle.first_seen_at.get_or_insert(now);

        for (field, value) in raffle.timestamp_fields() {
            if is_millisecond_range(value) {
                // Reportable anomaly, never a silent fix; the auditor
                // surfaces these as well.
                warn!(
                    post_id = %raffle.post_id,
                    field,
                    value,
                    "millisecond-range timestamp stored on raffle"
                );
            }
        }

        let new_day = day_key_for(&raffle, self.config.day_key_utc_offset_minutes, now);

        let old_day = {
            let index = overlay.index_mut(&*self.kv).await?;
            index.get(&raffle.post_id).cloned()
        };

        if let Some(old_day) = old_day.filter(|d| *d != new_day) {
            let old_bucket = overlay.bucket_mut(&*self.kv, &old_day).await?;
            old_bucket.remove(&raffle.post_id);
            let emptied = old_bucket.is_empty();
            overlay.touch(&old_day);
            if emptied {
                overlay.day_set_mut(&*self.kv).await?.remove(&old_day);
            }
            debug!(
                post_id = %raffle.post_id,
                from = %old_day,
                to = %new_day,
                "raffle migrated between day buckets"
            );
        }

        let bucket = overlay.bucket_mut(&*self.kv, &new_day).await?;
        bucket.insert(raffle.post_id.clone(), raffle.clone());
        overlay.touch(&new_day);
        overlay
            .index_mut(&*self.kv)
            .await?
            .insert(raffle.post_id.clone(), new_day.clone());
        overlay.day_set_mut(&*self.kv).await?.insert(new_day);

        Ok(raffle)
    }

    async fn remove_in(&self, overlay: &mut BatchOverlay, post_id: &str) -> Result<bool> {
        let day_key = {
            let index = overlay.index_mut(&*self.kv).await?;
            match index.remove(post_id) {
                Some(day) => day,
                None => return Ok(false),
            }
        };

        let bucket = overlay.bucket_mut(&*self.kv, &day_key).await?;
        bucket.remove(post_id);
        let emptied = bucket.is_empty();
        overlay.touch(&day_key);
        if emptied {
            overlay.day_set_mut(&*self.kv).await?.remove(&day_key);
        }
        Ok(true)
    }
}
