//! Wire types for the raffle gateway.

use serde::{Deserialize, Serialize};

/// A gateway response: HTTP status plus the decoded payload when the body
/// parsed. Non-success statuses usually carry no payload.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authoritative raffle payload. Whatever is present here overwrites the
/// stored raffle wholesale; absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaffleData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_stars: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrevealed_for_current_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

/// A freshly negotiated bearer credential.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenGrant {
    pub webbit_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webview_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        let ok: ApiResponse<RaffleData> = ApiResponse {
            status: 200,
            data: None,
        };
        assert!(ok.is_success());

        for status in [401, 404, 500] {
            let resp: ApiResponse<RaffleData> = ApiResponse { status, data: None };
            assert!(!resp.is_success());
        }
    }

    #[test]
    fn test_raffle_data_tolerates_partial_payloads() {
        let data: RaffleData =
            serde_json::from_str(r#"{"winnerName":"alice","stickerStars":4}"#).unwrap();
        assert_eq!(data.winner_name.as_deref(), Some("alice"));
        assert_eq!(data.sticker_stars, Some(4));
        assert_eq!(data.end_time, None);
    }
}
