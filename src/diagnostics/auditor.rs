//! # Invariant Auditor
//!
//! Read-only, cooldown-throttled consistency check over the full store.
//! Findings are reported and logged, never corrected: an invariant
//! violation means a bug elsewhere, and papering over it here would hide
//! the bug.

use crate::config::AuditConfig;
use crate::constants::is_millisecond_range;
use crate::error::Result;
use crate::storage::RaffleStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Findings of one audit pass.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub scanned_buckets: usize,
    pub scanned_raffles: usize,
    /// `postId`s present in more than one bucket.
    pub duplicate_post_ids: Vec<String>,
    /// Index entries that disagree with bucket contents, and bucket
    /// entries the index does not know.
    pub index_mismatches: Vec<String>,
    /// Day-set entries without a non-empty bucket, and non-empty buckets
    /// missing from the day-set.
    pub day_set_inconsistencies: Vec<String>,
    /// `(postId, field)` pairs carrying millisecond-range timestamps.
    pub millisecond_timestamps: Vec<(String, String)>,
    /// Raffles missing sticker name or tier.
    pub sticker_metadata_gaps: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_post_ids.is_empty()
            && self.index_mismatches.is_empty()
            && self.day_set_inconsistencies.is_empty()
            && self.millisecond_timestamps.is_empty()
            && self.sticker_metadata_gaps.is_empty()
    }
}

/// Throttled full-store consistency checker.
pub struct InvariantAuditor {
    cooldown: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl InvariantAuditor {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            cooldown: Duration::from_secs(config.cooldown_seconds),
            last_run: Mutex::new(None),
        }
    }

    /// Run an audit unless one ran within the cooldown; returns `None`
    /// when throttled.
    #[instrument(skip_all)]
    pub async fn audit(&self, store: &RaffleStore) -> Result<Option<AuditReport>> {
        {
            let mut last_run = self.last_run.lock();
            if last_run.is_some_and(|at| at.elapsed() < self.cooldown) {
                debug!("audit throttled by cooldown");
                return Ok(None);
            }
            *last_run = Some(Instant::now());
        }

        let snapshot = store.snapshot().await?;
        let mut report = AuditReport {
            scanned_buckets: snapshot.buckets.len(),
            ..AuditReport::default()
        };

        // Bucket ownership: each postId in exactly one bucket, under
        // exactly the indexed day key.
        let mut owners: HashMap<&str, Vec<&str>> = HashMap::new();
        for (day_key, bucket) in &snapshot.buckets {
            for (post_id, raffle) in bucket {
                report.scanned_raffles += 1;
                owners.entry(post_id.as_str()).or_default().push(day_key);

                for (field, value) in raffle.timestamp_fields() {
                    if is_millisecond_range(value) {
                        report
                            .millisecond_timestamps
                            .push((post_id.clone(), field.to_string()));
                    }
                }
                // Unresolved raffles legitimately lack sticker data; a
                // resolved one without it is a reporting gap.
                if raffle.winner.is_recorded()
                    && (raffle.raffle.sticker_name.as_deref().unwrap_or("").is_empty()
                        || raffle.raffle.sticker_stars.is_none())
                {
                    report.sticker_metadata_gaps.push(post_id.clone());
                }

                match snapshot.index.get(post_id) {
                    Some(indexed_day) if indexed_day == day_key => {}
                    Some(indexed_day) => report.index_mismatches.push(format!(
                        "{post_id}: bucket {day_key}, index says {indexed_day}"
                    )),
                    None => report
                        .index_mismatches
                        .push(format!("{post_id}: bucket {day_key}, not indexed")),
                }
            }
        }
        for (post_id, days) in owners {
            if days.len() > 1 {
                report.duplicate_post_ids.push(post_id.to_string());
            }
        }
        for (post_id, indexed_day) in &snapshot.index {
            let present = snapshot
                .buckets
                .get(indexed_day)
                .is_some_and(|b| b.contains_key(post_id));
            if !present {
                report
                    .index_mismatches
                    .push(format!("{post_id}: indexed under {indexed_day}, bucket disagrees"));
            }
        }

        // Day-set must equal the set of non-empty buckets.
        for day_key in &snapshot.day_set {
            let non_empty = snapshot.buckets.get(day_key).is_some_and(|b| !b.is_empty());
            if !non_empty {
                report
                    .day_set_inconsistencies
                    .push(format!("{day_key}: in day-set but bucket is empty"));
            }
        }
        for (day_key, bucket) in &snapshot.buckets {
            if !bucket.is_empty() && !snapshot.day_set.contains(day_key) {
                report
                    .day_set_inconsistencies
                    .push(format!("{day_key}: non-empty bucket missing from day-set"));
            }
        }

        report.duplicate_post_ids.sort();
        report.index_mismatches.sort();
        report.day_set_inconsistencies.sort();

        if report.is_clean() {
            info!(
                buckets = report.scanned_buckets,
                raffles = report.scanned_raffles,
                "store audit clean"
            );
        } else {
            warn!(
                duplicates = report.duplicate_post_ids.len(),
                index_mismatches = report.index_mismatches.len(),
                day_set = report.day_set_inconsistencies.len(),
                millisecond_timestamps = report.millisecond_timestamps.len(),
                sticker_gaps = report.sticker_metadata_gaps.len(),
                "store audit found inconsistencies"
            );
        }
        Ok(Some(report))
    }
}
