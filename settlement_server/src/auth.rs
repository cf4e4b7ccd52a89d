//! Caller identity
//!
//! Authentication happens upstream of this server. The marketplace's gateway resolves the caller and forwards their
//! identity in the `X-User-Id` and `X-User-Role` headers; this server trusts those headers and only performs its own
//! domain checks (job ownership, being a party to a payment).
use std::{
    fmt::Display,
    future::{ready, Ready},
    str::FromStr,
};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpRequest};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(AuthError::InvalidRole(format!("'{s}' is not a valid role"))),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The resolved identity of whoever is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::MissingIdentity(format!("The {USER_ID_HEADER} header is required")))?;
        let role = headers
            .get(USER_ROLE_HEADER)
            .ok_or_else(|| AuthError::MissingIdentity(format!("The {USER_ROLE_HEADER} header is required")))?
            .to_str()
            .map_err(|e| AuthError::InvalidRole(e.to_string()))?
            .parse::<Role>()?;
        Ok(Self { user_id: user_id.to_string(), role })
    }

    pub fn has_role(&self, role: Role) -> bool {
        // Administrators can do everything a user can
        self.role == role || self.role == Role::Admin
    }
}

impl FromRequest for Caller {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = Caller::from_headers(req.headers()).map_err(|e| {
            debug!("💻️ Rejecting request to {} without a valid caller identity. {e}", req.path());
            ServerError::from(e)
        });
        ready(result)
    }
}
