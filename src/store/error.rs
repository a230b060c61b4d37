use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Bad user input. Shown to the user as-is, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter option label")]
    MissingLabel,
    #[error("Please select a sub-template")]
    MissingSubTemplate,
    #[error("Sub-template not found: {0}")]
    SubTemplateNotFound(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Persisting templates failed: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
