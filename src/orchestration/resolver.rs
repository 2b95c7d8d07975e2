//! # Resolution Engine
//!
//! Scans the store for expired, unresolved raffles and advances each one
//! through the gateway: ensure token, fetch (with exactly one 401-triggered
//! token refresh), merge, policy-gated claim, optional re-fetch.
//!
//! Persistence discipline: the raffle is written back through the store
//! after every terminal step, never batched across round trips, so an
//! interruption costs at most one redo of the current raffle. No gateway
//! failure escapes this module; every branch lands in the raffle's status
//! fields.

use crate::client::{RaffleApi, TokenGrant};
use crate::config::ResolutionConfig;
use crate::constants::events;
use crate::error::Result;
use crate::models::{ClaimInfo, Raffle};
use crate::orchestration::claim_policy::evaluate_claim_policy;
use crate::orchestration::merge::{apply_solo_winner_fallback, merge_authoritative};
use crate::orchestration::types::{CandidateOutcome, ScanSummary};
use crate::state_machine::{derive_phase, record_attempt, RafflePhase, Transport};
use crate::storage::RaffleStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Whether a step sequence continues or ends this raffle's pass.
#[derive(Debug)]
pub(crate) enum StepFlow {
    Continue,
    Stop(CandidateOutcome),
}

/// Drives expired raffles toward a terminal state.
pub struct ResolutionEngine {
    store: Arc<RaffleStore>,
    api: Arc<dyn RaffleApi>,
    config: ResolutionConfig,
}

impl ResolutionEngine {
    pub fn new(store: Arc<RaffleStore>, api: Arc<dyn RaffleApi>, config: ResolutionConfig) -> Self {
        Self { store, api, config }
    }

    pub fn store(&self) -> &Arc<RaffleStore> {
        &self.store
    }

    pub(crate) fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// One full resolution pass over the store. Never returns an error: an
    /// unexpected fault flips the summary's `crashed` flag and everything
    /// persisted before the fault stays persisted.
    #[instrument(skip(self))]
    pub async fn run_scan(&self) -> ScanSummary {
        let started_at = Utc::now().timestamp();
        let mut summary = ScanSummary::new(started_at);

        if let Err(err) = self.scan_inner(&mut summary).await {
            error!(error = %err, "resolution scan crashed; keeping progress persisted so far");
            summary.crashed = true;
        }
        summary.finished_at = Utc::now().timestamp();

        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            resolved = summary.resolved,
            claimed = summary.claimed,
            errored = summary.errored,
            crashed = summary.crashed,
            "resolution scan finished"
        );

        let line = format!(
            "scan: {} candidates, {} resolved, {} claimed, {} errored{}",
            summary.scanned,
            summary.resolved,
            summary.claimed,
            summary.errored,
            if summary.crashed { ", crashed" } else { "" },
        );
        if let Err(err) = self.store.append_journal_today(&line).await {
            warn!(error = %err, "failed to append scan journal line");
        }
        self.store.events().publish(
            events::SCAN_COMPLETED,
            serde_json::to_value(&summary).unwrap_or_default(),
        );

        summary
    }

    async fn scan_inner(&self, summary: &mut ScanSummary) -> Result<()> {
        let now = Utc::now().timestamp();

        let mut candidates = Vec::new();
        for day_key in self.store.list_day_keys().await? {
            for raffle in self.store.list_by_day(&day_key).await? {
                if self.is_candidate(&raffle, now) {
                    candidates.push(raffle);
                } else {
                    summary.skipped += 1;
                }
            }
        }
        summary.scanned = candidates.len();

        let throttle = Duration::from_millis(self.config.throttle_delay_ms);
        for (position, raffle) in candidates.into_iter().enumerate() {
            if position > 0 && !throttle.is_zero() {
                sleep(throttle).await;
            }
            let post_id = raffle.post_id.clone();
            let outcome = self.process_candidate(raffle).await?;
            debug!(post_id = %post_id, ?outcome, "candidate processed");
            summary.record(outcome);
        }
        Ok(())
    }

    /// Candidate filter. A raffle is due for processing when it has ended
    /// and neither a winner nor a permanent failure has settled it.
    pub(crate) fn is_candidate(&self, raffle: &Raffle, now: i64) -> bool {
        if raffle.winner.is_recorded() {
            return false;
        }
        match raffle.status.transport {
            // Deleted upstream; never retried.
            Some(t) if t.is_permanent_failure() => return false,
            // Unauthorized parks the raffle until a fresh credential
            // arrives (discovery re-seeing the post, or a manual token
            // action).
            Some(Transport::Http(401)) => {
                let refreshed_since = match (
                    raffle.token.token_fetched_at,
                    raffle.status.last_error_at,
                ) {
                    (Some(token_at), Some(error_at)) => token_at > error_at,
                    (Some(_), None) => true,
                    _ => false,
                };
                return refreshed_since && raffle.has_ended(now);
            }
            _ => {}
        }
        matches!(
            derive_phase(raffle, now),
            RafflePhase::Expired | RafflePhase::Claimed
        )
    }

    /// The per-candidate step sequence of a scheduled scan.
    async fn process_candidate(&self, mut raffle: Raffle) -> Result<CandidateOutcome> {
        if let StepFlow::Stop(outcome) = self.ensure_token_step(&mut raffle).await? {
            return Ok(outcome);
        }
        if let StepFlow::Stop(outcome) = self.fetch_step(&mut raffle).await? {
            return Ok(outcome);
        }

        let now = Utc::now().timestamp();
        if let Some(policy) = evaluate_claim_policy(&raffle, &self.config.current_user_id, now) {
            let label = policy.to_string();
            if let StepFlow::Stop(outcome) = self.claim_step(&mut raffle, &label).await? {
                return Ok(outcome);
            }
        }

        Ok(self.outcome_of(&raffle))
    }

    pub(crate) fn outcome_of(&self, raffle: &Raffle) -> CandidateOutcome {
        if raffle.winner.is_recorded() {
            self.store.events().publish(
                events::RAFFLE_RESOLVED,
                serde_json::json!({
                    "postId": raffle.post_id,
                    "winnerId": raffle.winner.winner_id,
                    "winnerName": raffle.winner.winner_name,
                }),
            );
            CandidateOutcome::Resolved
        } else if raffle.has_pending_claim() {
            CandidateOutcome::Claimed
        } else {
            CandidateOutcome::Pending
        }
    }

    /// Re-derive the phase and persist, returning the stored copy.
    async fn finalize(&self, mut raffle: Raffle, now: i64) -> Result<Raffle> {
        raffle.status.phase = derive_phase(&raffle, now);
        self.store.put(raffle).await
    }

    /// Step: make sure a bearer token is present, requesting one when a
    /// source URL exists. Records `no-token` and stops when neither is
    /// available.
    pub(crate) async fn ensure_token_step(&self, raffle: &mut Raffle) -> Result<StepFlow> {
        if raffle.token.is_present() {
            return Ok(StepFlow::Continue);
        }
        let has_source = raffle.token.has_source_url()
            || raffle.url.as_deref().is_some_and(|u| !u.is_empty());
        if !has_source {
            let now = Utc::now().timestamp();
            record_attempt(
                &mut raffle.status,
                Transport::NetworkError,
                Some("no-token: bearer token absent and no source URL"),
                now,
            );
            *raffle = self.finalize(raffle.clone(), now).await?;
            return Ok(StepFlow::Stop(CandidateOutcome::Failed));
        }
        self.refresh_token_step(raffle).await
    }

    /// Step: negotiate a fresh bearer token and persist it. A 500 here
    /// parks the raffle permanently like everywhere else.
    pub(crate) async fn refresh_token_step(&self, raffle: &mut Raffle) -> Result<StepFlow> {
        let now = Utc::now().timestamp();
        match self.api.refresh_token(raffle).await {
            Err(err) => {
                record_attempt(
                    &mut raffle.status,
                    err.transport(),
                    Some(&format!("token refresh failed: {err}")),
                    now,
                );
                *raffle = self.finalize(raffle.clone(), now).await?;
                Ok(StepFlow::Stop(CandidateOutcome::Failed))
            }
            Ok(response) if response.status == 500 => {
                record_attempt(
                    &mut raffle.status,
                    Transport::Http(500),
                    Some("gateway reports raffle deleted"),
                    now,
                );
                *raffle = self.finalize(raffle.clone(), now).await?;
                Ok(StepFlow::Stop(CandidateOutcome::Failed))
            }
            Ok(response) => {
                let success = response.is_success();
                let grant = response
                    .data
                    .filter(|g: &TokenGrant| success && !g.webbit_token.is_empty());
                match grant {
                    Some(grant) => {
                        raffle.token.webbit_token = Some(grant.webbit_token);
                        if grant.gateway_origin.is_some() {
                            raffle.token.gateway_origin = grant.gateway_origin;
                        }
                        if grant.webview_url.is_some() {
                            raffle.token.webview_url = grant.webview_url;
                        }
                        raffle.token.token_fetched_at = Some(now);
                        record_attempt(&mut raffle.status, Transport::Ok, None, now);
                        *raffle = self.finalize(raffle.clone(), now).await?;
                        Ok(StepFlow::Continue)
                    }
                    None => {
                        record_attempt(
                            &mut raffle.status,
                            Transport::Http(response.status),
                            Some("token negotiation failed"),
                            now,
                        );
                        *raffle = self.finalize(raffle.clone(), now).await?;
                        Ok(StepFlow::Stop(CandidateOutcome::Failed))
                    }
                }
            }
        }
    }

    /// Step: fetch raffle data. A first 401 triggers exactly one token
    /// refresh and one resubmission; a second 401 is terminal for this
    /// pass. A 500 is terminal forever.
    pub(crate) async fn fetch_step(&self, raffle: &mut Raffle) -> Result<StepFlow> {
        let mut response = match self.api.fetch_raffle(raffle).await {
            Ok(response) => response,
            Err(err) => return self.record_transport_failure(raffle, &err).await,
        };

        if response.status == 401 {
            debug!(post_id = %raffle.post_id, "unauthorized; refreshing token once");
            if let StepFlow::Stop(outcome) = self.refresh_token_step(raffle).await? {
                return Ok(StepFlow::Stop(outcome));
            }
            response = match self.api.fetch_raffle(raffle).await {
                Ok(response) => response,
                Err(err) => return self.record_transport_failure(raffle, &err).await,
            };
            if response.status == 401 {
                let now = Utc::now().timestamp();
                record_attempt(
                    &mut raffle.status,
                    Transport::Http(401),
                    Some("unauthorized after token refresh"),
                    now,
                );
                *raffle = self.finalize(raffle.clone(), now).await?;
                return Ok(StepFlow::Stop(CandidateOutcome::Failed));
            }
        }

        let now = Utc::now().timestamp();
        if response.status == 500 {
            record_attempt(
                &mut raffle.status,
                Transport::Http(500),
                Some("gateway reports raffle deleted"),
                now,
            );
            *raffle = self.finalize(raffle.clone(), now).await?;
            return Ok(StepFlow::Stop(CandidateOutcome::Failed));
        }
        if !response.is_success() {
            record_attempt(&mut raffle.status, Transport::Http(response.status), None, now);
            *raffle = self.finalize(raffle.clone(), now).await?;
            return Ok(StepFlow::Stop(CandidateOutcome::Failed));
        }

        record_attempt(&mut raffle.status, Transport::Ok, None, now);
        if let Some(data) = &response.data {
            merge_authoritative(raffle, data, now);
        }
        if self.config.infer_solo_winner {
            apply_solo_winner_fallback(raffle, &self.config.current_user_id, now);
        }
        *raffle = self.finalize(raffle.clone(), now).await?;
        Ok(StepFlow::Continue)
    }

    /// Step: claim the raffle, then re-fetch once when the win is still
    /// unrevealed so the winner identity resolves.
    pub(crate) async fn claim_step(&self, raffle: &mut Raffle, policy_label: &str) -> Result<StepFlow> {
        let now = Utc::now().timestamp();
        let response = match self.api.claim(raffle).await {
            Ok(response) => response,
            Err(err) => return self.record_transport_failure(raffle, &err).await,
        };

        if response.status == 500 {
            record_attempt(
                &mut raffle.status,
                Transport::Http(500),
                Some("gateway reports raffle deleted"),
                now,
            );
            *raffle = self.finalize(raffle.clone(), now).await?;
            return Ok(StepFlow::Stop(CandidateOutcome::Failed));
        }
        if !response.is_success() {
            record_attempt(
                &mut raffle.status,
                Transport::Http(response.status),
                Some("claim rejected"),
                now,
            );
            *raffle = self.finalize(raffle.clone(), now).await?;
            return Ok(StepFlow::Stop(CandidateOutcome::Failed));
        }

        record_attempt(&mut raffle.status, Transport::Ok, None, now);
        raffle.claim = Some(ClaimInfo {
            claimed_at: Some(now),
            policy: Some(policy_label.to_string()),
        });
        if let Some(data) = &response.data {
            merge_authoritative(raffle, data, now);
        }
        *raffle = self.finalize(raffle.clone(), now).await?;
        self.store.events().publish(
            events::RAFFLE_CLAIMED,
            serde_json::json!({ "postId": raffle.post_id, "policy": policy_label }),
        );

        if raffle.raffle.unrevealed_for_current_user == Some(true) {
            debug!(post_id = %raffle.post_id, "still unrevealed after claim; re-fetching once");
            return self.fetch_step(raffle).await;
        }
        Ok(StepFlow::Continue)
    }

    async fn record_transport_failure(
        &self,
        raffle: &mut Raffle,
        err: &crate::client::ApiError,
    ) -> Result<StepFlow> {
        let now = Utc::now().timestamp();
        record_attempt(
            &mut raffle.status,
            err.transport(),
            Some(&err.to_string()),
            now,
        );
        *raffle = self.finalize(raffle.clone(), now).await?;
        Ok(StepFlow::Stop(CandidateOutcome::Failed))
    }
}
