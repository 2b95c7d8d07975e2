//! Destructive maintenance operations.
//!
//! Bulk deletion and force-resolution require an explicit [`Confirmation`]
//! and always run a full-store export first, so an operator mistake can be
//! undone from the dump.

use super::raffle_store::RaffleStore;
use super::StorageError;
use crate::constants::{events, storage_keys};
use crate::error::{Result, TrackerError};
use crate::models::{Raffle, WinnerInfo};
use crate::state_machine::derive_phase;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit operator acknowledgement for a destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The caller has confirmed the data loss.
    Confirmed,
    /// Default stance; every destructive operation refuses it.
    Declined,
}

/// Outcome of a destructive operation, including the pre-mutation export.
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    /// Full-store dump taken before any mutation, in the storage dump
    /// format (`key -> serialized value`). The caller decides where to
    /// archive it.
    pub export: String,
    pub removed_raffles: usize,
    pub removed_days: Vec<String>,
}

/// Maintenance entry points over a shared store.
pub struct MaintenanceOps {
    store: Arc<RaffleStore>,
}

impl MaintenanceOps {
    pub fn new(store: Arc<RaffleStore>) -> Self {
        Self { store }
    }

    /// Serialize the entire persisted store state as a dump compatible with
    /// the browser-side tracker's export.
    pub async fn export_all(&self) -> Result<String> {
        let snapshot = self.store.snapshot().await?;

        let mut dump: BTreeMap<String, String> = BTreeMap::new();
        for (day_key, bucket) in &snapshot.buckets {
            dump.insert(
                storage_keys::bucket_key(day_key),
                serde_json::to_string(bucket).map_err(StorageError::from)?,
            );
        }
        dump.insert(
            storage_keys::RAFFLE_INDEX.to_string(),
            serde_json::to_string(&snapshot.index).map_err(StorageError::from)?,
        );
        dump.insert(
            storage_keys::RAFFLE_DAYS.to_string(),
            serde_json::to_string(&snapshot.day_set)
                .map_err(StorageError::from)?,
        );

        let export = serde_json::to_string_pretty(&dump)
            .map_err(StorageError::from)?;
        self.store
            .events()
            .publish(events::MAINTENANCE_EXPORTED, serde_json::json!({
                "buckets": snapshot.buckets.len(),
            }));
        Ok(export)
    }

    /// Delete every raffle owned by a day key strictly before `cutoff`.
    pub async fn clear_records_before(
        &self,
        cutoff_day_key: &str,
        confirmation: Confirmation,
    ) -> Result<MaintenanceReport> {
        self.require_confirmed(confirmation, "clear_records_before")?;

        let export = self.export_all().await?;
        let day_keys = self.store.list_day_keys().await?;

        let mut removed_raffles = 0usize;
        let mut removed_days = Vec::new();

        self.store.begin_batch().await?;
        let outcome: Result<()> = async {
            for day_key in day_keys {
                if day_key.as_str() >= cutoff_day_key {
                    continue;
                }
                let raffles = self.store.list_by_day(&day_key).await?;
                for raffle in &raffles {
                    self.store.remove(&raffle.post_id).await?;
                }
                removed_raffles += raffles.len();
                removed_days.push(day_key);
            }
            Ok(())
        }
        .await;

        if let Err(error) = outcome {
            self.store.abort_batch().await?;
            return Err(error);
        }
        self.store.flush().await?;

        info!(
            cutoff = cutoff_day_key,
            removed_raffles,
            removed_days = removed_days.len(),
            "cleared records before cutoff"
        );
        Ok(MaintenanceReport {
            export,
            removed_raffles,
            removed_days,
        })
    }

    /// Force a winner onto a raffle and re-derive its phase. Used when the
    /// gateway will never report the winner but the operator knows it.
    pub async fn force_resolve(
        &self,
        post_id: &str,
        winner_id: Option<String>,
        winner_name: Option<String>,
        confirmation: Confirmation,
    ) -> Result<Raffle> {
        self.require_confirmed(confirmation, "force_resolve")?;

        if winner_id.as_deref().unwrap_or("").is_empty()
            && winner_name.as_deref().unwrap_or("").is_empty()
        {
            return Err(TrackerError::Validation(
                "force_resolve requires a winner id or name".into(),
            ));
        }

        let mut raffle = self
            .store
            .get(post_id)
            .await?
            .ok_or_else(|| TrackerError::Validation(format!("unknown postId: {post_id}")))?;

        let export = self.export_all().await?;
        let now = Utc::now().timestamp();

        raffle.winner = WinnerInfo {
            winner_id,
            winner_name,
            winner_fetched_at: Some(now),
        };
        raffle.status.phase = derive_phase(&raffle, now);
        let stored = self.store.put(raffle).await?;

        info!(
            post_id,
            phase = %stored.status.phase,
            export_bytes = export.len(),
            "raffle force-resolved"
        );
        Ok(stored)
    }

    fn require_confirmed(&self, confirmation: Confirmation, operation: &str) -> Result<()> {
        if confirmation != Confirmation::Confirmed {
            warn!(operation, "destructive operation refused without confirmation");
            return Err(TrackerError::Maintenance(format!(
                "{operation} requires explicit confirmation"
            )));
        }
        Ok(())
    }
}
