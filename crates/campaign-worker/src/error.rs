//! Campaign-worker errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Dispatch(#[from] core_dispatch::DispatchError),

    #[error("campaign not claimed: {0}")]
    NotClaimed(uuid::Uuid),
}
