use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A namespace-parameterized request arrived with a blank namespace.
    #[error("namespace must not be blank")]
    BlankNamespace,

    /// Request rejected by the active fault policy.
    #[error("request rejected by fault policy")]
    FaultRejected,

    /// IO error while serving.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Storage error.
    #[error(transparent)]
    Store(#[from] maildrop_store::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BlankNamespace => StatusCode::BAD_REQUEST,
            Self::FaultRejected => StatusCode::SERVICE_UNAVAILABLE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(maildrop_store::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(maildrop_store::Error::NamespaceUnsupported) => {
                StatusCode::NOT_IMPLEMENTED
            }
            Self::Store(maildrop_store::Error::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
