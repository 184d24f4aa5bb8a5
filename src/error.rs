use thiserror::Error;
use tokio::io;

use crate::backend::BackendError;
use crate::export::ExportError;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("Not signed in")]
    NotSignedIn,
}

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

/// Everything the command-line front-end can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    FromString(String),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("{0}")]
    Prompt(#[from] dialoguer::Error),
}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        ServiceError::FromString(message)
    }
}
