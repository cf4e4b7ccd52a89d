use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MomoApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Gateway request timed out: {0}")]
    Timeout(String),
    #[error("Could not reach the gateway: {0}")]
    Transport(String),
    #[error("Gateway credential exchange failed: {0}")]
    Authentication(String),
    #[error("Gateway declined the request. [{code}] {message}")]
    Rejected { code: String, message: String },
    #[error("Gateway error. Status {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl MomoApiError {
    /// True when the failure says nothing about whether the gateway would accept the request, i.e. it never got a
    /// definitive answer.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<reqwest::Error> for MomoApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
