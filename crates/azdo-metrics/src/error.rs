//! Error types for the metrics core.

use thiserror::Error;

/// Errors raised while registering gauge families.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("family already registered: {0}")]
    AlreadyRegistered(String),

    #[error("invalid family name: {0:?}")]
    InvalidName(String),

    #[error("invalid label {label:?} in family {family}")]
    InvalidLabel { family: String, label: String },
}

/// Errors raised when handing a finished cycle to the committer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("commit queue closed")]
    QueueClosed,
}
