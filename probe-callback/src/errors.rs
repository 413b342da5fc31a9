//! Callback error types

use probe_http::HttpError;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Failed to bind callback receiver on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Search request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Search was not accepted for asynchronous processing (status {status}): {body}")]
    NotAccepted { status: u16, body: String },

    #[error("Search response did not carry a task id: {0}")]
    MissingTaskId(String),
}
