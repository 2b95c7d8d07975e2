//! # Raffle Model
//!
//! The raffle entity and its sub-records. Identity is `postId`, unique and
//! immutable once assigned. All timestamps are unix **seconds**; a
//! millisecond-range value is an anomaly that the auditor reports rather
//! than silently rewrites.
//!
//! Field ownership follows the write discipline of the store:
//! - `raffle.*` is authoritative gateway data, overwritten wholesale when a
//!   fetch returns it; anything written before that is a heuristic
//!   placeholder.
//! - `token.*` is owned exclusively by the resolution engine's token-refresh
//!   step.
//! - `winner.*` is monotonic: once non-empty it is never cleared.
//! - `status.*` is derived bookkeeping (see [`crate::state_machine`]).

use crate::state_machine::{RafflePhase, Transport};
use serde::{Deserialize, Serialize};

/// Authoritative raffle attributes reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaffleDetails {
    /// When the raffle closes, unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_name: Option<String>,
    /// Sticker tier, 1..=5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_stars: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_ids: Option<Vec<String>>,
    /// Server-reported participant count. May disagree with
    /// `participant_ids` while data is heuristic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<u32>,
    /// Server-reported flag: the winner has not yet been disclosed to the
    /// current caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrevealed_for_current_user: Option<bool>,
}

/// Per-raffle bearer credential for the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webbit_token: Option<String>,
    /// Source URL a fresh token can be negotiated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_fetched_at: Option<i64>,
}

impl TokenInfo {
    /// A token is present when the bearer string is non-empty.
    pub fn is_present(&self) -> bool {
        self.webbit_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// A refresh is possible when some source URL is known.
    pub fn has_source_url(&self) -> bool {
        self.webview_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Winner identity. Monotonic: once either field is non-empty the record is
/// permanently authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WinnerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_fetched_at: Option<i64>,
}

impl WinnerInfo {
    /// True when a winner has been recorded (either identity field
    /// non-empty). The `"nobody"` sentinel counts as recorded: the raffle is
    /// terminal even though no one won.
    pub fn is_recorded(&self) -> bool {
        self.winner_id.as_deref().is_some_and(|v| !v.is_empty())
            || self.winner_name.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Derived status bookkeeping. Never hand-written; produced by
/// [`crate::state_machine::derive`] after every attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusInfo {
    pub phase: RafflePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Join bookkeeping for raffles the current user entered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entered_at: Option<i64>,
}

/// Claim bookkeeping. Presence of `claimed_at` with no recorded winner means
/// the claim has not yet been superseded by authoritative data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<i64>,
    /// Which policy triggered the claim, for reporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// A tracked raffle. Identity is `post_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Raffle {
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    pub raffle: RaffleDetails,
    pub token: TokenInfo,
    pub winner: WinnerInfo,
    pub status: StatusInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimInfo>,
}

impl Raffle {
    /// Effective timestamp used for day-key sharding, in priority order:
    /// end time, last seen, first seen, created.
    pub fn effective_timestamp(&self) -> Option<i64> {
        self.raffle
            .end_time
            .or(self.last_seen_at)
            .or(self.first_seen_at)
            .or(self.created_at)
    }

    /// True when the raffle's end time has passed.
    pub fn has_ended(&self, now: i64) -> bool {
        self.raffle.end_time.is_some_and(|end| end <= now)
    }

    /// True when a claim was recorded and no authoritative winner has
    /// superseded it yet.
    pub fn has_pending_claim(&self) -> bool {
        self.claim
            .as_ref()
            .is_some_and(|c| c.claimed_at.is_some())
            && !self.winner.is_recorded()
    }

    /// All second-granularity timestamps carried by this raffle, with field
    /// labels. Used by the auditor to report millisecond-range anomalies.
    pub fn timestamp_fields(&self) -> Vec<(&'static str, i64)> {
        let mut fields = Vec::new();
        let mut push = |name, value: Option<i64>| {
            if let Some(v) = value {
                fields.push((name, v));
            }
        };
        push("firstSeenAt", self.first_seen_at);
        push("lastSeenAt", self.last_seen_at);
        push("createdAt", self.created_at);
        push("updatedAt", self.updated_at);
        push("raffle.endTime", self.raffle.end_time);
        push("token.tokenFetchedAt", self.token.token_fetched_at);
        push("winner.winnerFetchedAt", self.winner.winner_fetched_at);
        push("status.lastAttemptAt", self.status.last_attempt_at);
        push("status.lastSuccessAt", self.status.last_success_at);
        push("status.lastErrorAt", self.status.last_error_at);
        push("entry.enteredAt", self.entry.as_ref().and_then(|e| e.entered_at));
        push("claim.claimedAt", self.claim.as_ref().and_then(|c| c.claimed_at));
        fields
    }
}

/// Minimally-populated record supplied by the discovery collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateRaffle {
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webbit_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_origin: Option<String>,
}

impl Raffle {
    /// Build a freshly-discovered raffle from a candidate record. The
    /// descriptive fields stay non-authoritative until a fetch enriches
    /// them.
    pub fn from_candidate(candidate: CandidateRaffle, now: i64) -> Self {
        Raffle {
            post_id: candidate.post_id,
            url: candidate.url,
            permalink: candidate.permalink,
            post_title: candidate.post_title,
            first_seen_at: Some(now),
            last_seen_at: Some(now),
            created_at: Some(now),
            updated_at: Some(now),
            raffle: RaffleDetails {
                end_time: candidate.end_time,
                ..RaffleDetails::default()
            },
            token: TokenInfo {
                webbit_token: candidate.webbit_token,
                webview_url: candidate.webview_url,
                gateway_origin: candidate.gateway_origin,
                token_fetched_at: None,
            },
            ..Raffle::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timestamp_priority() {
        let mut raffle = Raffle {
            post_id: "t3_abc".into(),
            first_seen_at: Some(100),
            last_seen_at: Some(200),
            created_at: Some(50),
            ..Raffle::default()
        };
        raffle.raffle.end_time = Some(300);
        assert_eq!(raffle.effective_timestamp(), Some(300));

        raffle.raffle.end_time = None;
        assert_eq!(raffle.effective_timestamp(), Some(200));

        raffle.last_seen_at = None;
        assert_eq!(raffle.effective_timestamp(), Some(100));

        raffle.first_seen_at = None;
        assert_eq!(raffle.effective_timestamp(), Some(50));

        raffle.created_at = None;
        assert_eq!(raffle.effective_timestamp(), None);
    }

    #[test]
    fn test_winner_recorded_detection() {
        let mut winner = WinnerInfo::default();
        assert!(!winner.is_recorded());

        winner.winner_name = Some(String::new());
        assert!(!winner.is_recorded());

        winner.winner_name = Some("alice".into());
        assert!(winner.is_recorded());

        let by_id = WinnerInfo {
            winner_id: Some("u_1".into()),
            ..WinnerInfo::default()
        };
        assert!(by_id.is_recorded());
    }

    #[test]
    fn test_pending_claim_superseded_by_winner() {
        let mut raffle = Raffle {
            post_id: "t3_abc".into(),
            claim: Some(ClaimInfo {
                claimed_at: Some(1_000),
                policy: None,
            }),
            ..Raffle::default()
        };
        assert!(raffle.has_pending_claim());

        raffle.winner.winner_id = Some("u_1".into());
        assert!(!raffle.has_pending_claim());
    }

    #[test]
    fn test_serde_field_names_match_storage_dumps() {
        let mut raffle = Raffle {
            post_id: "t3_xyz".into(),
            ..Raffle::default()
        };
        raffle.raffle.sticker_stars = Some(3);
        raffle.raffle.unrevealed_for_current_user = Some(true);
        raffle.token.webbit_token = Some("tok".into());

        let json = serde_json::to_value(&raffle).unwrap();
        assert_eq!(json["postId"], "t3_xyz");
        assert_eq!(json["raffle"]["stickerStars"], 3);
        assert_eq!(json["raffle"]["unrevealedForCurrentUser"], true);
        assert_eq!(json["token"]["webbitToken"], "tok");
    }

    #[test]
    fn test_from_candidate_stamps_seen_times() {
        let candidate = CandidateRaffle {
            post_id: "t3_new".into(),
            url: Some("https://example.com/r/new".into()),
            end_time: Some(2_000),
            webbit_token: Some("tok".into()),
            ..CandidateRaffle::default()
        };
        let raffle = Raffle::from_candidate(candidate, 1_500);
        assert_eq!(raffle.first_seen_at, Some(1_500));
        assert_eq!(raffle.last_seen_at, Some(1_500));
        assert_eq!(raffle.raffle.end_time, Some(2_000));
        assert!(raffle.token.is_present());
        assert!(!raffle.winner.is_recorded());
    }
}
