//! Integration-layer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("no credentials configured for provider {0:?}")]
    NoCredentials(core_models::Provider),

    #[error("webhook error: {0}")]
    Webhook(String),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] core_dispatch::DispatchError),
}
