//! Errors shared by the domain model layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("invalid media stream URL: {0}")]
    InvalidWssUrl(String),

    #[error("invalid credential format: {0}")]
    InvalidCredentialFormat(String),
}
