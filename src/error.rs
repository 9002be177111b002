use std::io;

use thiserror::Error;

use crate::response::Status;

/// Failures raised by a [`MessageStore`](crate::store::MessageStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("inserted message not found by text lookup")]
    LostInsert,
}

/// Everything that can go wrong while handling a single connection.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("request body expected but Content-Length is missing")]
    MissingLength,

    #[error("required field `{0}` missing from body")]
    MissingField(&'static str),

    #[error("unreadable request body: {0}")]
    BadBody(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Status code to answer with, or `None` when the connection should be
    /// closed without writing anything.
    pub fn status(&self) -> Option<Status> {
        match self {
            ServerError::MissingLength | ServerError::MissingField(_) | ServerError::BadBody(_) => {
                Some(Status::BadRequest)
            }
            ServerError::NotFound => Some(Status::NotFound),
            ServerError::Forbidden => Some(Status::Forbidden),
            ServerError::Store(_) | ServerError::Task(_) => Some(Status::InternalServerError),
            ServerError::MalformedRequest(_) | ServerError::Io(_) => None,
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadBody(err.to_string())
    }
}
