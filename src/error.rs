use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 401. The session has already been expired by the
    /// time a caller sees this.
    #[error("session expired or not authorized")]
    Unauthorized,

    #[error("API request failed with status {status}: {}", message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("failed to reach the API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Short text for toasts and inline form errors.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Company name is required".to_string()),
        };
        assert_eq!(err.user_message(), "Company name is required");

        let err = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert!(err.user_message().contains("500"));
        assert!(!err.is_unauthorized());
        assert!(ApiError::Unauthorized.is_unauthorized());
    }
}
