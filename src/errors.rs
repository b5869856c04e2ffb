//! Errors for the drowsiness dashboard
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Resource {0} is already polled with a different type")]
    ResourceTypeMismatch(String),

    #[error("Poll returned no usable data: {0}")]
    EmptyPoll(String),
}

impl DashboardError {
    /// Text shown inline under a form when a request fails.
    ///
    /// API errors carry the server's body when there is one, which is what
    /// the forms display.
    pub fn inline_message(&self) -> String {
        match self {
            DashboardError::Api { message, status } if message.trim().is_empty() => {
                format!("Request failed: {}", status)
            }
            DashboardError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
