//! Claim eligibility policies.
//!
//! Two mutually exclusive gates, both deliberately conservative. 5-star and
//! indeterminate-tier wins are never auto-claimed, not even by the manual
//! action path.

use crate::constants::{AUTO_CLAIM_BLOCKED_STARS, WINNER_NOBODY_SENTINEL};
use crate::models::Raffle;
use std::fmt;

/// Which gate matched for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPolicy {
    /// The current user won and the win is still unrevealed.
    SelfClaim,
    /// The current user never entered; claiming only settles the winner
    /// identity for the books.
    NonParticipant,
}

impl fmt::Display for ClaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfClaim => write!(f, "self-claim"),
            Self::NonParticipant => write!(f, "non-participant"),
        }
    }
}

/// True when the sticker tier forbids auto-claiming: 5-star, or a tier the
/// tracker has not learned yet.
pub fn auto_claim_blocked(sticker_stars: Option<u8>) -> bool {
    !matches!(sticker_stars, Some(stars) if stars != AUTO_CLAIM_BLOCKED_STARS)
}

/// Evaluate the claim gates for a raffle at time `now`. At most one policy
/// can match; `None` means no claim is made this pass.
pub fn evaluate_claim_policy(
    raffle: &Raffle,
    current_user_id: &str,
    now: i64,
) -> Option<ClaimPolicy> {
    if current_user_id.is_empty() || !raffle.has_ended(now) {
        return None;
    }
    // A claim is an irreversible external side effect. One already went out
    // and has not been superseded; re-fetching, not re-claiming, is how the
    // winner gets resolved from here.
    if raffle.has_pending_claim() {
        return None;
    }

    let details = &raffle.raffle;

    // Self-claim: our own win, still unrevealed, tier known and below five.
    let won_by_current_user = raffle
        .winner
        .winner_id
        .as_deref()
        .is_some_and(|id| id == current_user_id);
    if won_by_current_user
        && details.unrevealed_for_current_user == Some(true)
        && !auto_claim_blocked(details.sticker_stars)
    {
        return Some(ClaimPolicy::SelfClaim);
    }

    // Non-participant bookkeeping claim: revealed, we never entered, and no
    // winner (not even the "nobody" sentinel) has been recorded.
    let participated = details
        .participant_ids
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .any(|id| id == current_user_id);
    let nobody_sentinel = raffle
        .winner
        .winner_name
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(WINNER_NOBODY_SENTINEL));
    if details.unrevealed_for_current_user == Some(false)
        && !participated
        && !raffle.winner.is_recorded()
        && !nobody_sentinel
    {
        return Some(ClaimPolicy::NonParticipant);
    }

    None
}
