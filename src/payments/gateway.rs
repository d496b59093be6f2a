use crate::payments::error::PaymentResult;
use crate::payments::types::{
    InitializeRequest, InitializeResponse, VerifyResponse, WebhookEvent,
};
use async_trait::async_trait;

/// Capability interface over the external payment gateway
///
/// Holds no local state; every method maps to one outbound call or a pure
/// computation over payload bytes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote transaction and obtain the hosted payment page URL.
    async fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> PaymentResult<InitializeResponse>;

    /// Query the gateway's source-of-truth status for a transaction.
    async fn verify_transaction(&self, gateway_reference: &str) -> PaymentResult<VerifyResponse>;

    /// Check a webhook signature against the raw payload bytes as received.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool;

    /// Parse a webhook delivery into a structured event.
    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent>;

    fn name(&self) -> &'static str;
}
