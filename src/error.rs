use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::remote::RemoteCallError;

/// Classification of a failure surfaced by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Remote service unreachable or the session broke mid-call
    SystemConnectivity,
    /// Remote replied with something that could not be decoded
    MalformedRemoteResponse,
    /// Remote executed and reported a domain failure
    RemoteBusinessRejection,
    MissingRequiredData,
    LocalProcessingCrash,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SystemConnectivity => "system_connectivity",
            FailureKind::MalformedRemoteResponse => "malformed_remote_response",
            FailureKind::RemoteBusinessRejection => "remote_business_rejection",
            FailureKind::MissingRequiredData => "missing_required_data",
            FailureKind::LocalProcessingCrash => "local_processing_crash",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AuditorError {
    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Processing crash: {0}")]
    Crash(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AuditorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AuditorError::Remote(e) => e.kind(),
            AuditorError::MissingData(_) => FailureKind::MissingRequiredData,
            AuditorError::Crash(_)
            | AuditorError::Config(_)
            | AuditorError::Io(_)
            | AuditorError::Json(_)
            | AuditorError::Toml(_) => FailureKind::LocalProcessingCrash,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_their_classification() {
        let err: AuditorError = RemoteCallError::EmptyResponse {
            address: "http://x".to_string(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::MalformedRemoteResponse);

        let err: AuditorError = RemoteCallError::ConnectionFailure {
            address: "http://x".to_string(),
            cause: "refused".to_string(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::SystemConnectivity);
        assert!(err.to_string().starts_with("Connection Failed"));
    }

    #[test]
    fn local_errors_are_crashes() {
        let err = AuditorError::Config("bad".to_string());
        assert_eq!(err.kind(), FailureKind::LocalProcessingCrash);
        assert_eq!(
            AuditorError::MissingData("x".into()).kind(),
            FailureKind::MissingRequiredData
        );
    }
}
