//! Identity provider adapter.
//!
//! The sync coordinator needs three things from an auth provider: who the
//! current user is, whether they are anonymous, and a bearer token for the
//! remote document service. [`IdentityProvider`] is that seam;
//! [`HttpIdentityProvider`] implements it against `pikaworld-server`.
//!
//! # Session Lifecycle
//!
//! 1. **Unauthenticated** - no session in memory or on disk
//! 2. **Anonymous** - `initialize` found no usable session and signed in anonymously
//! 3. **Authenticated** - `sign_in` / `sign_up` succeeded
//!
//! `sign_out` returns to Unauthenticated until the next `initialize`.

use std::fs;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::protocol::{ErrorResponse, SignInRequest, SignUpRequest};

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// A bearer token plus the identity it belongs to.
///
/// This is both the auth endpoints' response body and the session file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserIdentity,
}

/// Errors from identity operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Authentication rejected: {0}")]
    Rejected(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Session file error for {}: {}", .0.display(), .1)]
    SessionFile(PathBuf, #[source] io::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Http(e.to_string())
    }
}

/// Adapter over an external authentication provider.
pub trait IdentityProvider: Send + Sync {
    /// Restores or establishes a session.
    fn initialize(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserIdentity>;

    /// Bearer token for the remote document service, if signed in.
    fn access_token(&self) -> Option<String>;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn current_user_id(&self) -> Option<String> {
        self.current_user().map(|user| user.user_id)
    }

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    fn is_anonymous(&self) -> bool {
        self.current_user().is_some_and(|user| user.is_anonymous)
    }
}

impl<T: IdentityProvider> IdentityProvider for Arc<T> {
    fn initialize(&self) -> impl Future<Output = Result<(), AuthError>> + Send {
        (**self).initialize()
    }

    fn current_user(&self) -> Option<UserIdentity> {
        (**self).current_user()
    }

    fn access_token(&self) -> Option<String> {
        (**self).access_token()
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send {
        (**self).sign_in(email, password)
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send {
        (**self).sign_up(email, password, display_name)
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send {
        (**self).sign_out()
    }
}

/// Identity provider backed by the `pikaworld-server` auth endpoints.
#[derive(Debug)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    server_url: String,
    session_path: Option<PathBuf>,
    session: RwLock<Option<Session>>,
}

impl HttpIdentityProvider {
    /// Creates a provider for `server_url` with a per-request timeout.
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let server_url = server_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            server_url,
            session_path: None,
            session: RwLock::new(None),
        })
    }

    /// Persists the session to `path` so it survives restarts.
    pub fn with_session_path(mut self, path: PathBuf) -> Self {
        self.session_path = Some(path);
        self
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns a copy of the current session.
    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Loads the persisted session into memory without contacting the server.
    pub fn restore_session(&self) -> Option<UserIdentity> {
        let session = self.load_session_file()?;
        let user = session.user.clone();
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        Some(user)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn set_session(&self, session: Option<Session>) -> Result<(), AuthError> {
        if let Some(path) = &self.session_path {
            match &session {
                Some(session) => write_session_file(path, session)?,
                None => match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(AuthError::SessionFile(path.clone(), e)),
                },
            }
        }

        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
        Ok(())
    }

    /// Reads the session file. A missing or unreadable file means no session.
    fn load_session_file(&self) -> Option<Session> {
        let path = self.session_path.as_ref()?;
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read session file {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Ignoring invalid session file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Sends an auth request and stores the returned session.
    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<UserIdentity, AuthError> {
        let response = request.send().await?;
        let session: Session = check_response(response).await?.json().await?;
        let user = session.user.clone();
        self.set_session(Some(session))?;
        Ok(user)
    }

    /// Validates `token` against `/v1/auth/me`.
    async fn fetch_me(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let response = self
            .client
            .get(self.url("/v1/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn sign_in_anonymously(&self) -> Result<UserIdentity, AuthError> {
        let user = self
            .exchange(self.client.post(self.url("/v1/auth/anonymous")))
            .await?;
        tracing::info!("Signed in anonymously as {}", user.user_id);
        Ok(user)
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn initialize(&self) -> Result<(), AuthError> {
        let stored = self.session().or_else(|| self.load_session_file());

        if let Some(session) = stored {
            match self.fetch_me(&session.token).await {
                Ok(user) => {
                    tracing::debug!("Resumed session for {}", user.user_id);
                    return self.set_session(Some(Session {
                        token: session.token,
                        user,
                    }));
                }
                Err(AuthError::Rejected(reason)) => {
                    tracing::info!("Stored session rejected ({}), starting a new one", reason);
                    self.set_session(None)?;
                }
                Err(e) => return Err(e),
            }
        }

        self.sign_in_anonymously().await.map(|_| ())
    }

    fn current_user(&self) -> Option<UserIdentity> {
        self.session().map(|session| session.user)
    }

    fn access_token(&self) -> Option<String> {
        self.session().map(|session| session.token)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AuthError> {
        let body = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.exchange(self.client.post(self.url("/v1/auth/signin")).json(&body))
            .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        self.exchange(self.client.post(self.url("/v1/auth/signup")).json(&body))
            .await
    }

    /// Forgets the local session even if the server cannot be reached.
    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(token) = self.access_token() else {
            return Ok(());
        };

        self.set_session(None)?;

        let result = self
            .client
            .post(self.url("/v1/auth/signout"))
            .bearer_auth(token)
            .send()
            .await;
        match result {
            Ok(response) => {
                if let Err(e) = check_response(response).await {
                    tracing::warn!("Server rejected sign-out: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to reach server for sign-out: {}", e),
        }

        Ok(())
    }
}

fn write_session_file(path: &PathBuf, session: &Session) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AuthError::SessionFile(parent.to_path_buf(), e))?;
    }
    let contents = serde_json::to_string_pretty(session)
        .map_err(|e| AuthError::SessionFile(path.clone(), io::Error::other(e)))?;
    fs::write(path, contents).map_err(|e| AuthError::SessionFile(path.clone(), e))
}

/// Maps a non-2xx response to an [`AuthError`].
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::Rejected(message),
        StatusCode::CONFLICT => AuthError::AccountExists(message),
        StatusCode::BAD_REQUEST => AuthError::InvalidRequest(message),
        _ => AuthError::Server {
            status: status.as_u16(),
            message,
        },
    })
}
