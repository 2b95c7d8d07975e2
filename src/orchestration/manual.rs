//! Manually triggered per-raffle actions.
//!
//! Exposes the scheduled scan's step sequence under an explicit action
//! selector over a caller-supplied subset, with a configurable inter-raffle
//! delay. The 5-star / unknown-tier refusal holds even here.

use crate::error::Result;
use crate::orchestration::claim_policy::auto_claim_blocked;
use crate::orchestration::resolver::{ResolutionEngine, StepFlow};
use crate::orchestration::types::{CandidateOutcome, ManualAction, ManualSummary};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

impl ResolutionEngine {
    /// Run one action over the given raffles. `delay` overrides the
    /// configured inter-raffle pause when given.
    #[instrument(skip(self, post_ids), fields(count = post_ids.len()))]
    pub async fn run_manual(
        &self,
        action: ManualAction,
        post_ids: &[String],
        delay: Option<Duration>,
    ) -> Result<ManualSummary> {
        let pause =
            delay.unwrap_or_else(|| Duration::from_millis(self.config().manual_delay_ms));
        let mut summary = ManualSummary::default();

        for (position, post_id) in post_ids.iter().enumerate() {
            if position > 0 && !pause.is_zero() {
                sleep(pause).await;
            }
            summary.processed += 1;

            let Some(mut raffle) = self.store().get(post_id).await? else {
                warn!(post_id = %post_id, "manual action on unknown raffle");
                summary.refused += 1;
                continue;
            };

            let flow = match action {
                ManualAction::TokenOnly => self.refresh_token_step(&mut raffle).await?,
                ManualAction::FetchOnly => self.fetch_step(&mut raffle).await?,
                ManualAction::ClaimOnly => {
                    if auto_claim_blocked(raffle.raffle.sticker_stars) {
                        warn!(
                            post_id = %post_id,
                            stars = ?raffle.raffle.sticker_stars,
                            "refusing manual claim of blocked sticker tier"
                        );
                        summary.refused += 1;
                        continue;
                    }
                    self.claim_step(&mut raffle, "manual").await?
                }
            };

            match flow {
                StepFlow::Continue | StepFlow::Stop(CandidateOutcome::Resolved)
                | StepFlow::Stop(CandidateOutcome::Claimed)
                | StepFlow::Stop(CandidateOutcome::Pending) => summary.succeeded += 1,
                StepFlow::Stop(CandidateOutcome::Failed) => summary.errored += 1,
            }
        }

        info!(
            ?action,
            processed = summary.processed,
            succeeded = summary.succeeded,
            refused = summary.refused,
            errored = summary.errored,
            "manual action finished"
        );
        Ok(summary)
    }
}
