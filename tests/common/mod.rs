//! Shared test infrastructure: raffle builders, a scripted gateway fake,
//! and store helpers.

#![allow(dead_code)] // Not every test file uses every helper.

use async_trait::async_trait;
use fmv_tracker::client::{ApiError, ApiResponse, RaffleApi, RaffleData, TokenGrant};
use fmv_tracker::config::{ResolutionConfig, StorageConfig};
use fmv_tracker::models::{ClaimInfo, Raffle, WinnerInfo};
use fmv_tracker::orchestration::ResolutionEngine;
use fmv_tracker::storage::{MemoryKv, RaffleStore};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const CURRENT_USER: &str = "u_self";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Builder for test raffles.
pub struct RaffleBuilder {
    raffle: Raffle,
}

impl RaffleBuilder {
    pub fn new(post_id: &str) -> Self {
        let mut raffle = Raffle {
            post_id: post_id.to_string(),
            url: Some(format!("https://example.com/comments/{post_id}")),
            ..Raffle::default()
        };
        raffle.token.webbit_token = Some("token-initial".into());
        raffle.token.webview_url = Some(format!("https://webview.example/{post_id}"));
        raffle.token.gateway_origin = Some("https://gateway.example".into());
        Self { raffle }
    }

    pub fn ended(mut self) -> Self {
        self.raffle.raffle.end_time = Some(now() - 3_600);
        self
    }

    pub fn ending_at(mut self, end_time: i64) -> Self {
        self.raffle.raffle.end_time = Some(end_time);
        self
    }

    pub fn without_token(mut self) -> Self {
        self.raffle.token.webbit_token = None;
        self
    }

    pub fn without_source_url(mut self) -> Self {
        self.raffle.url = None;
        self.raffle.token.webview_url = None;
        self
    }

    pub fn with_winner(mut self, winner_id: &str, winner_name: &str) -> Self {
        self.raffle.winner = WinnerInfo {
            winner_id: Some(winner_id.to_string()),
            winner_name: Some(winner_name.to_string()),
            winner_fetched_at: Some(now()),
        };
        self
    }

    pub fn with_winner_id(mut self, winner_id: &str) -> Self {
        self.raffle.winner.winner_id = Some(winner_id.to_string());
        self
    }

    pub fn with_stars(mut self, stars: u8) -> Self {
        self.raffle.raffle.sticker_stars = Some(stars);
        self
    }

    pub fn unrevealed(mut self, value: bool) -> Self {
        self.raffle.raffle.unrevealed_for_current_user = Some(value);
        self
    }

    pub fn with_participants(mut self, ids: &[&str]) -> Self {
        self.raffle.raffle.participant_ids =
            Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_claim(mut self) -> Self {
        self.raffle.claim = Some(ClaimInfo {
            claimed_at: Some(now()),
            policy: None,
        });
        self
    }

    pub fn build(self) -> Raffle {
        self.raffle
    }
}

/// One scripted gateway reply.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Status(u16, Option<T>),
    NetworkError,
    Timeout,
}

impl<T: Clone> Scripted<T> {
    fn realize(self, what: &str) -> Result<ApiResponse<T>, ApiError> {
        match self {
            Scripted::Status(status, data) => Ok(ApiResponse { status, data }),
            Scripted::NetworkError => Err(ApiError::Network(format!("scripted {what} failure"))),
            Scripted::Timeout => Err(ApiError::Timeout(format!("scripted {what} timeout"))),
        }
    }
}

/// Gateway fake that replays scripted responses and records every call.
/// Panics on an unscripted call so a test never silently exercises more
/// gateway traffic than it declared.
#[derive(Default)]
pub struct ScriptedApi {
    fetch_replies: Mutex<VecDeque<Scripted<RaffleData>>>,
    claim_replies: Mutex<VecDeque<Scripted<RaffleData>>>,
    token_replies: Mutex<VecDeque<Scripted<TokenGrant>>>,
    pub fetch_calls: AtomicUsize,
    pub claim_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    /// Bearer token presented on each fetch, in call order.
    pub fetch_tokens: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_fetch(&self, reply: Scripted<RaffleData>) -> &Self {
        self.fetch_replies.lock().push_back(reply);
        self
    }

    pub fn script_claim(&self, reply: Scripted<RaffleData>) -> &Self {
        self.claim_replies.lock().push_back(reply);
        self
    }

    pub fn script_token(&self, reply: Scripted<TokenGrant>) -> &Self {
        self.token_replies.lock().push_back(reply);
        self
    }

    pub fn grant(token: &str) -> Scripted<TokenGrant> {
        Scripted::Status(
            200,
            Some(TokenGrant {
                webbit_token: token.to_string(),
                gateway_origin: None,
                webview_url: None,
            }),
        )
    }
}

#[async_trait]
impl RaffleApi for ScriptedApi {
    async fn refresh_token(
        &self,
        raffle: &Raffle,
    ) -> Result<ApiResponse<TokenGrant>, ApiError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .token_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted refresh_token for {}", raffle.post_id));
        reply.realize("token refresh")
    }

    async fn fetch_raffle(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_tokens
            .lock()
            .push(raffle.token.webbit_token.clone().unwrap_or_default());
        let reply = self
            .fetch_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted fetch_raffle for {}", raffle.post_id));
        reply.realize("fetch")
    }

    async fn claim(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .claim_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted claim for {}", raffle.post_id));
        reply.realize("claim")
    }
}

/// Key-value wrapper that starts rejecting writes after a set budget.
/// Exercises the scan's crash path without touching the filesystem.
pub struct FlakyKv {
    inner: MemoryKv,
    writes_left: AtomicUsize,
}

impl FlakyKv {
    pub fn failing_after(writes: usize) -> Self {
        Self {
            inner: MemoryKv::new(),
            writes_left: AtomicUsize::new(writes),
        }
    }
}

#[async_trait]
impl fmv_tracker::storage::KeyValueStore for FlakyKv {
    async fn get(&self, key: &str) -> Result<Option<String>, fmv_tracker::storage::StorageError> {
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), fmv_tracker::storage::StorageError> {
        if self.writes_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(fmv_tracker::storage::StorageError::Backend(
                "write budget exhausted".into(),
            ));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), fmv_tracker::storage::StorageError> {
        self.inner.delete(key).await
    }
}

/// Fresh in-memory store.
pub fn memory_store() -> (Arc<MemoryKv>, Arc<RaffleStore>) {
    let kv = Arc::new(MemoryKv::new());
    let store = Arc::new(RaffleStore::new(kv.clone(), StorageConfig::default()));
    (kv, store)
}

/// Engine over the given store and gateway fake, tuned for tests: no
/// throttle delays, claims acting for [`CURRENT_USER`].
pub fn test_engine(store: Arc<RaffleStore>, api: Arc<ScriptedApi>) -> ResolutionEngine {
    let config = ResolutionConfig {
        current_user_id: CURRENT_USER.to_string(),
        throttle_delay_ms: 0,
        manual_delay_ms: 0,
        infer_solo_winner: true,
    };
    ResolutionEngine::new(store, api, config)
}
