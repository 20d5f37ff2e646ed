use thiserror::Error;

/// Failure taxonomy for everything that talks to the Finanzguru API.
///
/// `Authentication` means the current credential is unusable and the user has
/// to log in again. `Transient` covers everything else and is safe to retry on
/// the next poll cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("request failed: {0}")]
    Transient(String),
}

impl ApiError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transient(error.to_string())
    }
}
