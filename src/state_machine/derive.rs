//! Pure derivation of a raffle's lifecycle phase and transport bookkeeping.
//!
//! Precedence, checked in order:
//! 1. A recorded winner is terminal: `resolved`, regardless of transport.
//! 2. An unauthorized (401) or hard server failure (500) outcome derives
//!    `inactive`.
//! 3. A claim not yet superseded derives `claimed`.
//! 4. A passed end time derives `expired`.
//! 5. Otherwise `discovered`.

use crate::models::{Raffle, StatusInfo};
use crate::state_machine::{RafflePhase, Transport};

/// Derive the lifecycle phase for a raffle at time `now`.
pub fn derive_phase(raffle: &Raffle, now: i64) -> RafflePhase {
    if raffle.winner.is_recorded() {
        return RafflePhase::Resolved;
    }
    if raffle
        .status
        .transport
        .is_some_and(|t| t.is_hard_failure())
    {
        return RafflePhase::Inactive;
    }
    if raffle.has_pending_claim() {
        return RafflePhase::Claimed;
    }
    if raffle.has_ended(now) {
        return RafflePhase::Expired;
    }
    RafflePhase::Discovered
}

/// Record the outcome of an external attempt on the status sub-record.
///
/// The transport classification is always overwritten. A success clears the
/// prior error fields (errors are not sticky once a later attempt succeeds);
/// a failure stamps them.
pub fn record_attempt(
    status: &mut StatusInfo,
    transport: Transport,
    error: Option<&str>,
    now: i64,
) {
    status.transport = Some(transport);
    status.last_attempt_at = Some(now);
    if transport.is_success() {
        status.last_success_at = Some(now);
        status.last_error_at = None;
        status.last_error = None;
    } else {
        status.last_error_at = Some(now);
        status.last_error = Some(
            error
                .map(str::to_string)
                .unwrap_or_else(|| transport.to_string()),
        );
    }
}
