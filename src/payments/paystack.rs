use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{
    GatewayState, InitializeRequest, InitializeResponse, VerifyResponse, WebhookEvent,
};
use crate::payments::utils::{verify_hmac_sha512_hex, GatewayHttpClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
        }
    }
}

impl PaystackConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("PAYSTACK_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "PAYSTACK_SECRET_KEY environment variable is required".to_string(),
                field: Some("PAYSTACK_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            webhook_secret: std::env::var("PAYSTACK_WEBHOOK_SECRET").ok(),
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            timeout_secs: std::env::var("PAYSTACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            secret_key,
        })
    }
}

pub struct PaystackGateway {
    config: PaystackConfig,
    http: GatewayHttpClient,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PaystackConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn webhook_secret(&self) -> &str {
        self.config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key)
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> PaymentResult<InitializeResponse> {
        if request.amount <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if request.email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "email is required for paystack initialization".to_string(),
                field: Some("email".to_string()),
            });
        }

        let payload = serde_json::json!({
            "email": request.email,
            "amount": request.amount,
            "reference": request.reference,
            "metadata": request.metadata,
        });

        let raw: PaystackEnvelope<PaystackInitializeData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/transaction/initialize"),
                Some(&self.config.secret_key),
                Some(&payload),
            )
            .await?;

        if !raw.status {
            return Err(PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: raw.message,
                retryable: false,
            });
        }
        let data = raw.data;
        info!(reference = %data.reference, "paystack transaction initialized");

        Ok(InitializeResponse {
            authorization_url: data.authorization_url,
            gateway_reference: data.reference,
        })
    }

    async fn verify_transaction(&self, gateway_reference: &str) -> PaymentResult<VerifyResponse> {
        if gateway_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "gateway reference is required".to_string(),
                field: Some("gateway_reference".to_string()),
            });
        }

        let raw: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transaction/verify/{}", gateway_reference)),
                Some(&self.config.secret_key),
                None,
            )
            .await?;

        if !raw.status {
            return Err(PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: raw.message,
                retryable: false,
            });
        }

        Ok(VerifyResponse {
            status: GatewayState::from_provider_status(&raw.data.status),
            amount: raw.data.amount,
            paid_at: raw.data.paid_at.as_deref().and_then(parse_timestamp),
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        verify_hmac_sha512_hex(payload, self.webhook_secret(), signature)
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let event_type = parsed
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let data = parsed.get("data");
        let gateway_reference = data
            .and_then(|v| v.get("reference"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let status = data
            .and_then(|v| v.get("status"))
            .and_then(|v| v.as_str())
            .map(GatewayState::from_provider_status);
        let amount = data.and_then(|v| v.get("amount")).and_then(|v| v.as_i64());
        let paid_at = data
            .and_then(|v| v.get("paid_at"))
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp);

        Ok(WebhookEvent {
            event_type,
            gateway_reference,
            status,
            amount,
            paid_at,
        })
    }

    fn name(&self) -> &'static str {
        "paystack"
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct PaystackInitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaystackVerifyData {
    amount: i64,
    status: String,
    #[serde(default)]
    paid_at: Option<String>,
}
