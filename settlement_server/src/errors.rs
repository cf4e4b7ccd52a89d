use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::SettlementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The callback could not be queued. {0}")]
    CallbackQueueUnavailable(String),
    #[error("{0}")]
    Settlement(#[from] SettlementError),
}

impl ServerError {
    /// The machine-readable error code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "ValidationError",
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::AuthenticationError(AuthError::InsufficientPermissions(_)) => "NotAuthorized",
            Self::AuthenticationError(AuthError::InvalidSignature(_)) => "InvalidSignature",
            Self::AuthenticationError(_) => "NotAuthenticated",
            Self::CallbackQueueUnavailable(_) => "ServiceUnavailable",
            Self::Settlement(e) => e.code(),
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => "InternalError",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
                AuthError::InvalidRole(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::InvalidSignature(_) => StatusCode::FORBIDDEN,
            },
            Self::CallbackQueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Settlement(e) => settlement_status_code(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "code": self.code() }).to_string())
    }
}

fn settlement_status_code(e: &SettlementError) -> StatusCode {
    match e {
        SettlementError::InvalidAmount(_) | SettlementError::ValidationError(_) => StatusCode::BAD_REQUEST,
        SettlementError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::AlreadyPaid { .. } => StatusCode::CONFLICT,
        SettlementError::PayoutNotAllowed(_) => StatusCode::CONFLICT,
        SettlementError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::GatewayRejected { .. } => StatusCode::BAD_GATEWAY,
        SettlementError::UnknownCorrelation(_) |
        SettlementError::PayoutFailure(_) |
        SettlementError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No caller identity was supplied. {0}")]
    MissingIdentity(String),
    #[error("The caller's role is not recognised. {0}")]
    InvalidRole(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Callback signature rejected. {0}")]
    InvalidSignature(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settlement_errors_map_to_http() {
        let e = ServerError::from(SettlementError::AlreadyPaid { job_id: "j".into(), application_id: "a".into() });
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        assert_eq!(e.code(), "AlreadyPaid");
        let e = ServerError::from(SettlementError::GatewayUnavailable("down".into()));
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let e = ServerError::from(SettlementError::GatewayRejected { reason: "no".into(), code: None });
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        let e = ServerError::from(SettlementError::NotAuthorized("not yours".into()));
        assert_eq!(e.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(e.code(), "NotAuthorized");
        let e = ServerError::AuthenticationError(AuthError::MissingIdentity("X-User-Id".into()));
        assert_eq!(e.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.code(), "NotAuthenticated");
    }
}
