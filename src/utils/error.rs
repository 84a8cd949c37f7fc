use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckInError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Authentication rejected (status {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Portal returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Navigation failed after {attempts} attempts: {message}")]
    Navigation { attempts: u32, message: String },

    #[error("No selector candidate resolved {what}")]
    ElementNotFound { what: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },
}

impl CheckInError {
    /// Transport-level failures are worth retrying; everything else is
    /// definitive.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckInError::Transport(_)
                | CheckInError::Browser(_)
                | CheckInError::Navigation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckInError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_is_not_retryable() {
        let err = CheckInError::Auth {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_navigation_error_is_retryable() {
        let err = CheckInError::Navigation {
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert!(err.is_retryable());
    }
}
