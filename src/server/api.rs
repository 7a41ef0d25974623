//! HTTP routes for `pikaworld-server`.
//!
//! # Endpoints
//!
//! Public:
//! - `GET /health`: Health check
//! - `POST /v1/auth/anonymous`: Create an anonymous user and session
//! - `POST /v1/auth/signup`: Register `{email, password, displayName?}`
//! - `POST /v1/auth/signin`: Sign in with `{email, password}`
//!
//! Bearer token required:
//! - `GET /v1/auth/me`: Current user
//! - `POST /v1/auth/signout`: Revoke the presented token
//! - `GET /v1/collections/{collection}?owner={id}`: Caller's documents, newest first
//! - `PUT /v1/collections/{collection}/{id}`: Merge upsert
//! - `DELETE /v1/collections/{collection}/{id}`: Delete

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use pikaworld_core::remote::protocol::{ErrorResponse, HealthResponse, SignInRequest, SignUpRequest};
use pikaworld_core::{Document, Session, UserIdentity};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::accounts::{AccountError, AccountStore};
use super::documents::{DocumentError, DocumentStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountStore>,
    pub documents: Arc<DocumentStore>,
}

/// The caller's session, added to request extensions after auth
#[derive(Debug, Clone)]
struct AuthSession {
    token: String,
    user: UserIdentity,
}

/// JSON error response with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {}", self.error, self.message);
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.error.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        let (status, error) = match &e {
            AccountError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "invalid_email"),
            AccountError::WeakPassword => (StatusCode::BAD_REQUEST, "weak_password"),
            AccountError::EmailTaken(_) => (StatusCode::CONFLICT, "email_taken"),
            AccountError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AccountError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        ApiError::new(status, error, e.to_string())
    }
}

impl From<DocumentError> for ApiError {
    fn from(e: DocumentError) -> Self {
        let (status, error) = match &e {
            DocumentError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            DocumentError::InvalidName(_) => (StatusCode::BAD_REQUEST, "invalid_name"),
            DocumentError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        ApiError::new(status, error, e.to_string())
    }
}

/// Builds the router with tracing.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/v1/auth/anonymous", post(sign_in_anonymously))
        .route("/v1/auth/signup", post(sign_up))
        .route("/v1/auth/signin", post(sign_in));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/v1/auth/me", get(me))
        .route("/v1/auth/signout", post(sign_out))
        .route("/v1/collections/{collection}", get(query_documents))
        .route(
            "/v1/collections/{collection}/{id}",
            put(upsert_document).delete(delete_document),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Authentication
// ============================================================================

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
        Some(_) => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_auth",
                "Authorization header must use Bearer scheme",
            )
            .into_response();
        }
        None => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            )
            .into_response();
        }
    };

    // Validate session token
    match state.accounts.resolve(&token) {
        Some(user) => {
            request.extensions_mut().insert(AuthSession { token, user });
            next.run(request).await
        }
        None => ApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Invalid or expired session token",
        )
        .into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn sign_in_anonymously(State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    let session = state.accounts.create_anonymous()?;
    tracing::info!("Created anonymous user {}", session.user.user_id);
    Ok(Json(session))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .accounts
        .sign_up(&body.email, &body.password, body.display_name)?;
    tracing::info!("Registered user {}", session.user.user_id);
    Ok(Json(session))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.accounts.sign_in(&body.email, &body.password)?;
    Ok(Json(session))
}

/// Get current user info (auth required)
async fn me(Extension(session): Extension<AuthSession>) -> Json<UserIdentity> {
    Json(session.user)
}

async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<StatusCode, ApiError> {
    state.accounts.sign_out(&session.token)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: Option<String>,
}

async fn query_documents(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(collection): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let owner = query.owner.unwrap_or_else(|| session.user.user_id.clone());
    if owner != session.user.user_id {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Cannot list another user's documents",
        ));
    }

    Ok(Json(state.documents.query_by_owner(&collection, &owner)?))
}

async fn upsert_document(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path((collection, id)): Path<(String, String)>,
    Json(payload): Json<Document>,
) -> Result<Json<Document>, ApiError> {
    let document =
        state
            .documents
            .upsert(&collection, &id, &session.user.user_id, payload)?;
    Ok(Json(document))
}

async fn delete_document(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .documents
        .delete(&collection, &id, &session.user.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}
