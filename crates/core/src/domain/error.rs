// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid version string: {0:?}")]
    InvalidVersion(String),

    #[error("Invalid upgrade step: {0:?}")]
    InvalidStep(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
