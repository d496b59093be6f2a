use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Thin HTTP client for gateway calls
///
/// One attempt per call with a bounded timeout. Failures surface to the
/// caller; nothing in this layer retries.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, timeout })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        let mut request = self.client.request(method, url).timeout(self.timeout);

        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(PaymentError::ProviderError {
                provider: "http".to_string(),
                message: format!("HTTP {}: {}", status, text),
                retryable: status.is_server_error(),
            });
        }

        serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
            provider: "http".to_string(),
            message: format!("invalid gateway JSON response: {}", e),
            retryable: false,
        })
    }
}

/// HMAC-SHA512 over the exact payload bytes, hex-encoded.
///
/// Webhook signatures must be computed over the raw request body as received;
/// re-serializing the parsed payload changes field ordering and breaks the
/// comparison.
pub fn compute_hmac_sha512_hex(payload: &[u8], secret: &str) -> Option<String> {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    type HmacSha512 = Hmac<Sha512>;
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_hmac_sha512_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    match compute_hmac_sha512_hex(payload, secret) {
        Some(computed) => secure_eq(computed.as_bytes(), signature.trim().as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison. Timing-attack resistance is a correctness
/// requirement for signature checks, not an optimization.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
