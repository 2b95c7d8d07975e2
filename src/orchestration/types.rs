//! Summary and selector types for the resolution engine.

use serde::{Deserialize, Serialize};

/// What happened to one candidate during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// A winner is now recorded.
    Resolved,
    /// A claim went out; the winner is still pending.
    Claimed,
    /// Advanced without reaching a terminal state; revisited next scan.
    Pending,
    /// The attempt failed; the failure is recorded on the raffle's status.
    Failed,
}

/// Result of one full resolution scan. All counters refer to raffles whose
/// state was already persisted when the scan ended, whether or not it
/// crashed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub started_at: i64,
    pub finished_at: i64,
    /// Candidates that entered processing.
    pub scanned: usize,
    /// Stored raffles the candidate filter passed over.
    pub skipped: usize,
    pub resolved: usize,
    pub claimed: usize,
    pub errored: usize,
    /// An unexpected fault aborted the scan loop; earlier progress is
    /// persisted.
    pub crashed: bool,
}

impl ScanSummary {
    pub fn new(started_at: i64) -> Self {
        Self {
            started_at,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Resolved => self.resolved += 1,
            CandidateOutcome::Claimed => self.claimed += 1,
            CandidateOutcome::Pending => {}
            CandidateOutcome::Failed => self.errored += 1,
        }
    }
}

/// Explicit per-step selector for manually triggered processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManualAction {
    /// Refresh the bearer token only.
    TokenOnly,
    /// Fetch and merge raffle data only.
    FetchOnly,
    /// Claim only. 5-star and unknown-tier raffles are refused even here.
    ClaimOnly,
}

/// Result of a manual action run over a caller-supplied subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSummary {
    pub processed: usize,
    pub succeeded: usize,
    /// Raffles the action refused to touch (blocked tier, unknown id).
    pub refused: usize,
    pub errored: usize,
}
