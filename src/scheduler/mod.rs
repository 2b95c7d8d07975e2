//! # Scheduler
//!
//! Cooperative single-producer gating for the discovery and resolution
//! loops. Multiple contexts may share one persistent store; only the one
//! whose context identifier exactly matches the configured canonical
//! identifier runs the loops, everyone else stays a passive reader. The
//! convention tolerates a brief dual-writer window during handoff because
//! every store mutation is an idempotent upsert keyed by `postId`.
//!
//! The scheduler is an explicit object owning its timers and enabled flags:
//! constructed once, started once, reconfigured at runtime through a watch
//! channel. Changing a period restarts that loop's timer.

use crate::config::SchedulerConfig;
use crate::error::{Result, TrackerError};
use crate::models::{CandidateRaffle, Raffle};
use crate::orchestration::ResolutionEngine;
use crate::storage::RaffleStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Supplies candidate raffle records from the external feed. Out of scope
/// here; the scheduler only drives it.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(&self) -> Result<Vec<CandidateRaffle>>;
}

/// Runtime-reconfigurable loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub discovery_enabled: bool,
    pub discovery_interval: Duration,
    pub resolution_enabled: bool,
    pub resolution_interval: Duration,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            discovery_enabled: config.discovery_enabled,
            discovery_interval: Duration::from_secs(config.discovery_interval_seconds),
            resolution_enabled: config.resolution_enabled,
            resolution_interval: Duration::from_secs(config.resolution_interval_seconds),
        }
    }
}

/// Owns the discovery and resolution loops of one context.
pub struct Scheduler {
    context_id: String,
    canonical_context_id: String,
    store: Arc<RaffleStore>,
    engine: Arc<ResolutionEngine>,
    discovery: Arc<dyn DiscoverySource>,
    settings_tx: watch::Sender<SchedulerSettings>,
    shutdown_tx: watch::Sender<bool>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<RaffleStore>,
        engine: Arc<ResolutionEngine>,
        discovery: Arc<dyn DiscoverySource>,
    ) -> Self {
        let context_id = config
            .context_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let (settings_tx, _) = watch::channel(SchedulerSettings::from(config));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            context_id,
            canonical_context_id: config.canonical_context_id.clone(),
            store,
            engine,
            discovery,
            settings_tx,
            shutdown_tx,
            handles: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// This context's identifier.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Exact match against the canonical identifier designates the sole
    /// active producer.
    pub fn is_canonical(&self) -> bool {
        self.context_id == self.canonical_context_id
    }

    /// Start both loops. Returns `false` without starting anything when
    /// this context is not the canonical producer.
    pub fn start(&self) -> Result<bool> {
        if !self.is_canonical() {
            info!(
                context_id = %self.context_id,
                canonical = %self.canonical_context_id,
                "not the canonical context; staying a passive reader"
            );
            return Ok(false);
        }
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return Err(TrackerError::Scheduler("scheduler already started".into()));
        }

        handles.push(tokio::spawn(discovery_loop(
            self.store.clone(),
            self.discovery.clone(),
            self.settings_tx.subscribe(),
            self.shutdown_tx.subscribe(),
        )));
        handles.push(tokio::spawn(resolution_loop(
            self.engine.clone(),
            self.settings_tx.subscribe(),
            self.shutdown_tx.subscribe(),
        )));

        info!(context_id = %self.context_id, "scheduler started as canonical producer");
        Ok(true)
    }

    /// Replace the loop settings. Both loops observe the change at their
    /// next wake-up and restart their timers.
    pub fn reconfigure(&self, settings: SchedulerSettings) {
        debug!(?settings, "scheduler reconfigured");
        let _ = self.settings_tx.send(settings);
    }

    /// Current loop settings.
    pub fn settings(&self) -> SchedulerSettings {
        self.settings_tx.borrow().clone()
    }

    /// Signal both loops to stop and wait for them to wind down. Safe at
    /// any point: persisted state stays consistent and unresolved raffles
    /// are revisited by whoever runs next.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!(context_id = %self.context_id, "scheduler stopped");
    }
}

/// Upsert one discovered candidate. New posts become fresh raffles; known
/// posts get their last-seen stamp bumped and missing descriptive fields
/// filled. A candidate carrying a bearer token refreshes the stored
/// credential, which is also what revives raffles parked on a 401.
fn apply_candidate(existing: Option<Raffle>, candidate: CandidateRaffle, now: i64) -> Raffle {
    match existing {
        None => Raffle::from_candidate(candidate, now),
        Some(mut raffle) => {
            raffle.last_seen_at = Some(now);
            if raffle.url.is_none() {
                raffle.url = candidate.url;
            }
            if raffle.permalink.is_none() {
                raffle.permalink = candidate.permalink;
            }
            if raffle.post_title.is_none() {
                raffle.post_title = candidate.post_title;
            }
            if raffle.raffle.end_time.is_none() {
                raffle.raffle.end_time = candidate.end_time;
            }
            if let Some(token) = candidate.webbit_token.filter(|t| !t.is_empty()) {
                raffle.token.webbit_token = Some(token);
                raffle.token.token_fetched_at = Some(now);
            }
            if candidate.webview_url.is_some() {
                raffle.token.webview_url = candidate.webview_url;
            }
            if candidate.gateway_origin.is_some() {
                raffle.token.gateway_origin = candidate.gateway_origin;
            }
            raffle
        }
    }
}

async fn run_discovery(store: &RaffleStore, discovery: &dyn DiscoverySource) {
    let candidates = match discovery.discover().await {
        Ok(candidates) => candidates,
        Err(err) => {
            warn!(error = %err, "discovery pass failed");
            return;
        }
    };
    let now = Utc::now().timestamp();
    let count = candidates.len();

    let outcome: Result<()> = async {
        store.begin_batch().await?;
        for candidate in candidates {
            if candidate.post_id.trim().is_empty() {
                continue;
            }
            let existing = store.get(&candidate.post_id).await?;
            store.put(apply_candidate(existing, candidate, now)).await?;
        }
        store.flush().await?;
        store.set_last_discovery_at(now).await?;
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => info!(candidates = count, "discovery pass committed"),
        Err(err) => {
            warn!(error = %err, "discovery pass aborted");
            let _ = store.abort_batch().await;
        }
    }
}

/// Discovery loop. On load it runs immediately only when the persisted
/// last-discovery stamp is older than the configured interval (an
/// elapsed-time check, so a reload does not reset the throttle).
#[instrument(skip_all)]
async fn discovery_loop(
    store: Arc<RaffleStore>,
    discovery: Arc<dyn DiscoverySource>,
    mut settings_rx: watch::Receiver<SchedulerSettings>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let settings = settings_rx.borrow().clone();
        let interval = settings.discovery_interval;

        let mut wait = interval;
        if settings.discovery_enabled {
            let elapsed = match store.last_discovery_at().await {
                Ok(Some(last)) => Duration::from_secs(
                    (Utc::now().timestamp() - last).max(0) as u64,
                ),
                Ok(None) => interval,
                Err(err) => {
                    warn!(error = %err, "failed to read last-discovery stamp");
                    interval
                }
            };
            if elapsed >= interval {
                run_discovery(&store, &*discovery).await;
            } else {
                wait = interval - elapsed;
                debug!(remaining_secs = wait.as_secs(), "discovery throttled");
            }
        }

        let tick = async {
            if settings.discovery_enabled {
                tokio::time::sleep(wait).await;
            } else {
                futures::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tick => {}
            result = settings_rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("discovery loop exited");
}

/// Resolution loop: runs immediately on load, then on a fixed repeating
/// timer.
#[instrument(skip_all)]
async fn resolution_loop(
    engine: Arc<ResolutionEngine>,
    mut settings_rx: watch::Receiver<SchedulerSettings>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let settings = settings_rx.borrow().clone();
        if settings.resolution_enabled {
            engine.run_scan().await;
        }

        let tick = async {
            if settings.resolution_enabled {
                tokio::time::sleep(settings.resolution_interval).await;
            } else {
                futures::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tick => {}
            result = settings_rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("resolution loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_apply_candidate_creates_new_raffle() {
        let candidate = CandidateRaffle {
            post_id: "t3_new".into(),
            end_time: Some(NOW + 3600),
            webbit_token: Some("tok".into()),
            ..CandidateRaffle::default()
        };
        let raffle = apply_candidate(None, candidate, NOW);
        assert_eq!(raffle.post_id, "t3_new");
        assert_eq!(raffle.first_seen_at, Some(NOW));
    }

    #[test]
    fn test_apply_candidate_keeps_authoritative_end_time() {
        let mut existing = Raffle {
            post_id: "t3_known".into(),
            last_seen_at: Some(NOW - 600),
            ..Raffle::default()
        };
        existing.raffle.end_time = Some(NOW + 100);

        let candidate = CandidateRaffle {
            post_id: "t3_known".into(),
            end_time: Some(NOW + 999),
            ..CandidateRaffle::default()
        };
        let merged = apply_candidate(Some(existing), candidate, NOW);
        assert_eq!(merged.raffle.end_time, Some(NOW + 100));
        assert_eq!(merged.last_seen_at, Some(NOW));
    }

    #[test]
    fn test_apply_candidate_refreshes_token() {
        let mut existing = Raffle {
            post_id: "t3_known".into(),
            ..Raffle::default()
        };
        existing.token.webbit_token = Some("stale".into());

        let candidate = CandidateRaffle {
            post_id: "t3_known".into(),
            webbit_token: Some("fresh".into()),
            ..CandidateRaffle::default()
        };
        let merged = apply_candidate(Some(existing), candidate, NOW);
        assert_eq!(merged.token.webbit_token.as_deref(), Some("fresh"));
        assert_eq!(merged.token.token_fetched_at, Some(NOW));
    }

    #[test]
    fn test_apply_candidate_ignores_empty_token() {
        let mut existing = Raffle {
            post_id: "t3_known".into(),
            ..Raffle::default()
        };
        existing.token.webbit_token = Some("stale".into());
        existing.token.token_fetched_at = Some(NOW - 500);

        let candidate = CandidateRaffle {
            post_id: "t3_known".into(),
            webbit_token: Some(String::new()),
            ..CandidateRaffle::default()
        };
        let merged = apply_candidate(Some(existing), candidate, NOW);
        assert_eq!(merged.token.webbit_token.as_deref(), Some("stale"));
        assert_eq!(merged.token.token_fetched_at, Some(NOW - 500));
    }
}
