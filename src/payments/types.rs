use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Transaction status as reported by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    Pending,
    Success,
    Failed,
    /// Anything the gateway reports that we don't recognize. Kept distinct so
    /// reconciliation can leave the local record untouched.
    Unknown,
}

impl GatewayState {
    pub fn from_provider_status(status: &str) -> Self {
        match status {
            "success" => GatewayState::Success,
            "pending" => GatewayState::Pending,
            "failed" => GatewayState::Failed,
            _ => GatewayState::Unknown,
        }
    }
}

/// Request to create a transaction on the gateway
///
/// Amounts are always in the smallest currency unit; the gateway never sees
/// major units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub email: String,
    pub amount: i64,
    pub reference: String,
    pub metadata: Option<JsonValue>,
}

/// Successful gateway initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub authorization_url: String,
    pub gateway_reference: String,
}

/// Result of querying the gateway's source-of-truth status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: GatewayState,
    pub amount: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Parsed webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    /// Reference embedded in the gateway-authored payload. Correlation is by
    /// this identifier, never by a client-supplied one.
    pub gateway_reference: Option<String>,
    pub status: Option<GatewayState>,
    pub amount: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            GatewayState::from_provider_status("success"),
            GatewayState::Success
        );
        assert_eq!(
            GatewayState::from_provider_status("failed"),
            GatewayState::Failed
        );
        assert_eq!(
            GatewayState::from_provider_status("pending"),
            GatewayState::Pending
        );
        assert_eq!(
            GatewayState::from_provider_status("abandoned"),
            GatewayState::Unknown
        );
    }

    #[test]
    fn initialize_request_serializes_to_json() {
        let request = InitializeRequest {
            email: "user@example.com".to_string(),
            amount: 50000,
            reference: "txn_ref_1".to_string(),
            metadata: Some(serde_json::json!({"user_id":"u1"})),
        };
        let json = serde_json::to_value(&request).expect("serialization should succeed");
        assert_eq!(json["amount"], 50000);
        assert_eq!(json["reference"], "txn_ref_1");
    }
}
