//! # Raffle Gateway Client
//!
//! Boundary to the external raffle API. The resolution engine talks to the
//! [`RaffleApi`] trait; [`HttpRaffleApi`] is the production implementation
//! and tests substitute scripted fakes.
//!
//! Every call is authenticated with the raffle's own bearer token against
//! the raffle's own gateway origin; there is no global credential.

pub mod http;
pub mod types;

use crate::models::Raffle;
use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpRaffleApi, RaffleApiConfig};
pub use types::{ApiResponse, RaffleData, TokenGrant};

/// Transport-level failures. HTTP status codes are *not* errors at this
/// boundary; they come back inside [`ApiResponse`] so the engine can apply
/// its retry policy per status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call never completed (DNS, connection reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The raffle carries no usable gateway origin or source URL.
    #[error("missing endpoint: {0}")]
    MissingEndpoint(String),
}

impl ApiError {
    /// Transport classification for the status bookkeeping.
    pub fn transport(&self) -> crate::state_machine::Transport {
        match self {
            ApiError::Timeout(_) => crate::state_machine::Transport::Timeout,
            _ => crate::state_machine::Transport::NetworkError,
        }
    }
}

/// External raffle data API, consumed per-raffle.
#[async_trait]
pub trait RaffleApi: Send + Sync {
    /// Negotiate a fresh bearer token from the raffle's source URL. The
    /// HTTP status comes back in the response so the engine's 500 policy
    /// applies to this step too.
    async fn refresh_token(&self, raffle: &Raffle) -> Result<ApiResponse<TokenGrant>, ApiError>;

    /// Fetch the authoritative raffle data.
    async fn fetch_raffle(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError>;

    /// Claim the raffle for the current user.
    async fn claim(&self, raffle: &Raffle) -> Result<ApiResponse<RaffleData>, ApiError>;
}
