use thiserror::Error;

use crate::error::FailureKind;

/// Classified outcome of a remote call that did not produce a usable payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteCallError {
    #[error("Connection Failed: {address}: {cause}")]
    ConnectionFailure { address: String, cause: String },

    #[error("Empty response from {address}")]
    EmptyResponse { address: String },

    #[error("Malformed response ({cause}): {raw}")]
    MalformedResponse { raw: String, cause: String },

    #[error("{message}")]
    RemoteBusinessError { message: String },
}

impl RemoteCallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteCallError::ConnectionFailure { .. } => FailureKind::SystemConnectivity,
            RemoteCallError::EmptyResponse { .. } | RemoteCallError::MalformedResponse { .. } => {
                FailureKind::MalformedRemoteResponse
            }
            RemoteCallError::RemoteBusinessError { .. } => FailureKind::RemoteBusinessRejection,
        }
    }

    pub(crate) fn malformed(raw: &str, cause: impl ToString) -> Self {
        // Model output can be long; keep the error readable
        const MAX_RAW: usize = 200;
        let raw = if raw.chars().count() > MAX_RAW {
            let head: String = raw.chars().take(MAX_RAW).collect();
            format!("{}…", head)
        } else {
            raw.to_string()
        };
        RemoteCallError::MalformedResponse {
            raw,
            cause: cause.to_string(),
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteCallError>;
