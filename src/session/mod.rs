//! Session store: the single source of truth for who is logged in.
//!
//! The token and principal live in persisted storage under `auth_token` and
//! `auth_user`; an in-memory copy serves synchronous reads.

pub mod storage;
pub mod token;

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AuthError, AuthErrorKind, ClientError, ValidationError};
use crate::gateway::{error_message, Gateway, RequestOptions};
use crate::types::{id_to_string, Principal, Role};

use storage::{LOGGED_IN_AT_KEY, TOKEN_KEY, USER_KEY};

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut error = ValidationError::new("Please enter your username and password");
        if self.username.trim().is_empty() {
            error = error.with_field("username", "Username is required");
        }
        if self.password.is_empty() {
            error = error.with_field("password", "Password is required");
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    pub logged_in_at: Option<DateTime<Utc>>,
}

pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Store over `storage`; call [`SessionStore::restore`] to load a persisted session
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Reloads the persisted session.
    ///
    /// Incomplete or unreadable state is discarded. A JWT whose `exp` has
    /// passed is discarded and reported as [`AuthErrorKind::Expired`].
    /// Storage that cannot be read at all is reset, so a corrupt file never
    /// blocks a fresh login.
    pub fn restore(&self) -> Result<Option<Principal>, ClientError> {
        let persisted = self
            .storage
            .get(TOKEN_KEY)
            .and_then(|token| Ok((token, self.storage.get(USER_KEY)?)));
        let (token, user) = match persisted {
            Ok(persisted) => persisted,
            Err(ClientError::Storage(reason)) => {
                tracing::warn!(%reason, "discarding unreadable session storage");
                self.set_current(None);
                if let Err(e) = self.storage.reset() {
                    tracing::warn!(error = %e, "failed to reset session storage");
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) => {
                self.set_current(None);
                return Ok(None);
            }
            _ => {
                tracing::warn!("discarding incomplete persisted session");
                self.clear()?;
                return Ok(None);
            }
        };

        let principal: Principal = match serde_json::from_str(&user) {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted principal");
                self.clear()?;
                return Ok(None);
            }
        };

        if token::is_expired(&token, Utc::now()) {
            tracing::info!(user = %principal.username, "persisted session has expired");
            self.clear()?;
            return Err(AuthError::expired().into());
        }

        let logged_in_at = self
            .storage
            .get(LOGGED_IN_AT_KEY)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc));

        tracing::debug!(user = %principal.username, role = %principal.role, "restored session");
        self.set_current(Some(Session {
            token,
            principal: principal.clone(),
            logged_in_at,
        }));
        Ok(Some(principal))
    }

    /// Authenticates against the backend and persists the new session.
    ///
    /// On any failure the current session is left exactly as it was.
    pub async fn login(
        &self,
        gateway: &Gateway,
        credentials: &Credentials,
    ) -> Result<Principal, ClientError> {
        credentials.validate()?;

        let body = json!({
            "username": credentials.username.trim(),
            "password": credentials.password,
        });
        let response = gateway
            .send(LOGIN_PATH, RequestOptions::post(body).anonymous())
            .await
            .map_err(|e| AuthError::network(format!("Unable to reach the server: {}", e.message)))?;

        if !response.is_success() {
            let error = login_error(response.status, &response.body);
            tracing::info!(
                user = %credentials.username,
                status = response.status,
                kind = %error.kind,
                "login rejected"
            );
            return Err(error.into());
        }

        let (token, principal) = parse_login_response(&response.body, credentials.username.trim())?;
        self.persist(&token, &principal)?;

        tracing::info!(user = %principal.username, role = %principal.role, "logged in");
        Ok(principal)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        if let Some(session) = self.current_session() {
            tracing::info!(user = %session.principal.username, "logged out");
        }
        self.clear()
    }

    /// Synchronous read; never performs network I/O
    pub fn current_principal(&self) -> Option<Principal> {
        self.read_current(|session| session.principal.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read_current(Session::clone)
    }

    pub fn token(&self) -> Option<String> {
        self.read_current(|session| session.token.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.read_current(|session| session.principal.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_current(|_| ()).is_some()
    }

    /// Persists `{token, principal}` in one write and makes it current; on
    /// failure neither storage nor the current session changes
    pub fn persist(&self, token: &str, principal: &Principal) -> Result<(), ClientError> {
        let now = Utc::now();
        let user = serde_json::to_string(principal)?;
        let logged_in_at = now.to_rfc3339();
        self.storage.set_many(&[
            (TOKEN_KEY, token),
            (USER_KEY, &user),
            (LOGGED_IN_AT_KEY, &logged_in_at),
        ])?;

        self.set_current(Some(Session {
            token: token.to_string(),
            principal: principal.clone(),
            logged_in_at: Some(now),
        }));
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.set_current(None);
        self.storage.remove_many(&[TOKEN_KEY, USER_KEY, LOGGED_IN_AT_KEY])
    }

    fn read_current<T>(&self, f: impl FnOnce(&Session) -> T) -> Option<T> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        current.as_ref().map(f)
    }

    fn set_current(&self, session: Option<Session>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = session;
    }
}

/// Structured error body some endpoints return: `{kind, message}`
#[derive(Debug, Deserialize)]
struct StructuredAuthError {
    kind: AuthErrorKind,
    #[serde(default)]
    message: Option<String>,
}

fn login_error(status: u16, body: &Value) -> AuthError {
    if let Ok(structured) = serde_json::from_value::<StructuredAuthError>(body.clone()) {
        let message = structured
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_login_message(structured.kind).to_string());
        return AuthError::new(structured.kind, message);
    }

    let message = error_message(body);
    match status {
        401 => AuthError::invalid_credentials(
            message.unwrap_or_else(|| default_login_message(AuthErrorKind::InvalidCredentials).to_string()),
        ),
        _ => AuthError::server_error(
            message.unwrap_or_else(|| default_login_message(AuthErrorKind::ServerError).to_string()),
        ),
    }
}

fn default_login_message(kind: AuthErrorKind) -> &'static str {
    match kind {
        AuthErrorKind::InvalidCredentials => "Invalid username or password",
        AuthErrorKind::Network => "Unable to reach the server. Please try again.",
        AuthErrorKind::ServerError => "Login failed. Please try again later.",
        AuthErrorKind::UnsupportedRole => "Your account role is not supported",
        AuthErrorKind::Expired => "Your session has expired. Please log in again.",
    }
}

/// Accepts `{token, ...user fields}`, `{token, user: {...}}` and either inside a `data` envelope
fn parse_login_response(body: &Value, submitted_username: &str) -> Result<(String, Principal), AuthError> {
    let body = match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    };

    let token = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::server_error("Login response did not include a token"))?;

    let user = body.get("user").filter(|u| u.is_object());
    let field = |names: &[&str]| lookup(body, user, names);
    let text = |names: &[&str]| {
        field(names)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let role_code = field(&["role"])
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::server_error("Login response did not include a role"))?;
    let role = Role::from_code(role_code).ok_or_else(|| AuthError::unsupported_role(role_code))?;

    let username = field(&["username"])
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .unwrap_or(submitted_username)
        .to_string();

    let principal = Principal {
        id: field(&["id", "_id", "userId"])
            .and_then(id_to_string)
            .unwrap_or_default(),
        username,
        email: text(&["email"]),
        first_name: text(&["firstName", "first_name"]),
        last_name: text(&["lastName", "last_name"]),
        role,
    };

    Ok((token.to_string(), principal))
}

/// First non-null value among `names`, looking in the nested user object before the top level
fn lookup<'a>(body: &'a Value, user: Option<&'a Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        user.and_then(|u| u.get(*name))
            .filter(|v| !v.is_null())
            .or_else(|| body.get(*name).filter(|v| !v.is_null()))
    })
}
