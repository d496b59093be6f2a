//! Services module for business logic and integrations

pub mod identity;
pub mod payment_orchestrator;

pub use crate::services::identity::{IdentityResolver, OAuthClient, OAuthConfig, ProviderProfile};
pub use crate::services::payment_orchestrator::{
    InitiatedPayment, OrchestratorError, OrchestratorResult, PaymentOrchestrator, WebhookOutcome,
};
