pub mod database;
pub mod network;

use crate::service::ServiceError;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    InvalidJson(String),

    #[error("{0}")]
    NotJson(String),

    #[error("{0}")]
    InvalidQuery(String),
}
