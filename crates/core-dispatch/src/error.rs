//! Dispatch-core errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Validation(#[from] core_models::ModelError),

    #[error("router dispatch failed: {0}")]
    RouterFailed(String),

    #[error("{0}")]
    Internal(String),
}
