// Client error types
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Every failure the client layer can surface to a page, dialog or CLI command.
///
/// All variants are cloneable so a single in-flight fetch can hand the same
/// failure to every reader that joined it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Text suitable for a transient notification (toast)
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Auth(err) => err.message.clone(),
            ClientError::Request(err) => err.message.clone(),
            ClientError::Network(_) => "Unable to reach the server. Please try again.".to_string(),
            ClientError::Validation(err) => err.message.clone(),
            ClientError::Storage(_) | ClientError::Decode(_) | ClientError::Config(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// HTTP status when the failure came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request(err) => Some(err.status),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            ClientError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

/// Non-2xx response from the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub status: u16,
    pub message: String,
}

impl RequestError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Error carrying the generic status-based message
    pub fn from_status(status: u16) -> Self {
        Self::new(status, generic_status_message(status))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// Pages redirect to login when this is true
    pub fn requires_login(&self) -> bool {
        self.is_unauthorized()
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Stable code for client handling and JSON output
    pub fn error_code(&self) -> &'static str {
        match self.status {
            400 => "BAD_REQUEST",
            401 => "UNAUTHORIZED",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            422 => "UNPROCESSABLE_ENTITY",
            429 => "TOO_MANY_REQUESTS",
            502 => "BAD_GATEWAY",
            503 => "SERVICE_UNAVAILABLE",
            s if (500..600).contains(&s) => "INTERNAL_SERVER_ERROR",
            _ => "REQUEST_FAILED",
        }
    }
}

pub(crate) fn generic_status_message(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("Request failed with status {} {}", status, reason),
        None => format!("Request failed with status {}", status),
    }
}

/// The request could not be sent or the response could not be received
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Network error: {message}")]
pub struct NetworkError {
    pub message: String,
}

impl NetworkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::new(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    #[serde(alias = "InvalidCredentials", alias = "invalidCredentials")]
    InvalidCredentials,
    #[serde(alias = "Network")]
    Network,
    #[serde(alias = "ServerError", alias = "serverError")]
    ServerError,
    #[serde(alias = "UnsupportedRole", alias = "unsupportedRole")]
    UnsupportedRole,
    #[serde(alias = "Expired")]
    Expired,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthErrorKind::InvalidCredentials => "invalid_credentials",
            AuthErrorKind::Network => "network",
            AuthErrorKind::ServerError => "server_error",
            AuthErrorKind::UnsupportedRole => "unsupported_role",
            AuthErrorKind::Expired => "expired",
        })
    }
}

/// Authentication failure with a user-presentable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidCredentials, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::ServerError, message)
    }

    pub fn unsupported_role(role: &str) -> Self {
        Self::new(
            AuthErrorKind::UnsupportedRole,
            format!("Role '{}' is not supported by this application", role),
        )
    }

    pub fn expired() -> Self {
        Self::new(
            AuthErrorKind::Expired,
            "Your session has expired. Please log in again.",
        )
    }
}

/// Form input rejected before any network call
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_errors.insert(field.into(), message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
