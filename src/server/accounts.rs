//! Account and session store for the identity endpoints.
//!
//! Users are either anonymous (created on demand, no credentials) or
//! registered with an email and password. Every sign-in issues a new
//! session token; tokens stay valid until sign-out.
//!
//! # File Format
//!
//! ```text
//! {
//!   "users":       { "<user_id>": { "userId", "email", "displayName", "isAnonymous" } },
//!   "credentials": { "<email>": { "user_id", "salt", "password_hash" } },
//!   "sessions":    { "<token>": "<user_id>" }
//! }
//! ```

use pikaworld_core::{Session, UserIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::storage::{ServerStorage, ServerStorageError};
use super::tokens::{generate_salt, generate_token, generate_user_id, hash_password, verify_password};

const ACCOUNTS_FILE: &str = "accounts";
const MIN_PASSWORD_LEN: usize = 6;

/// Errors from account operations.
#[derive(Debug)]
pub enum AccountError {
    /// Email is empty or malformed.
    InvalidEmail(String),
    /// Password is shorter than the minimum length.
    WeakPassword,
    /// An account with this email already exists.
    EmailTaken(String),
    /// Unknown email or wrong password.
    InvalidCredentials,
    /// Persisting the account state failed.
    Storage(ServerStorageError),
}

impl std::fmt::Display for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::InvalidEmail(email) => write!(f, "Invalid email address: '{}'", email),
            AccountError::WeakPassword => write!(
                f,
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ),
            AccountError::EmailTaken(email) => {
                write!(f, "An account already exists for {}", email)
            }
            AccountError::InvalidCredentials => write!(f, "Invalid email or password"),
            AccountError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for AccountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccountError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ServerStorageError> for AccountError {
    fn from(e: ServerStorageError) -> Self {
        AccountError::Storage(e)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    user_id: String,
    salt: String,
    password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountsState {
    #[serde(default)]
    users: BTreeMap<String, UserIdentity>,
    #[serde(default)]
    credentials: BTreeMap<String, Credential>,
    #[serde(default)]
    sessions: BTreeMap<String, String>,
}

impl AccountsState {
    fn issue_session(&mut self, user: &UserIdentity) -> Session {
        let token = generate_token();
        self.sessions.insert(token.clone(), user.user_id.clone());
        Session {
            token,
            user: user.clone(),
        }
    }
}

/// Thread-safe account store persisted to `accounts.json`.
#[derive(Debug)]
pub struct AccountStore {
    storage: ServerStorage,
    state: RwLock<AccountsState>,
}

impl AccountStore {
    /// Opens the store, loading any existing state.
    pub fn open(storage: ServerStorage) -> Result<Self, ServerStorageError> {
        let state: AccountsState = storage.load(ACCOUNTS_FILE)?;
        tracing::info!(
            "Loaded {} user(s), {} session(s)",
            state.users.len(),
            state.sessions.len()
        );
        Ok(Self {
            storage,
            state: RwLock::new(state),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, AccountsState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AccountsState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies `change` and persists; on failure the in-memory state is kept as before.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut AccountsState) -> Result<T, AccountError>,
    ) -> Result<T, AccountError> {
        let mut state = self.write();
        let mut next = state.clone();
        let result = change(&mut next)?;
        self.storage.save(ACCOUNTS_FILE, &next)?;
        *state = next;
        Ok(result)
    }

    /// Creates an anonymous user and a session for it.
    pub fn create_anonymous(&self) -> Result<Session, AccountError> {
        self.commit(|state| {
            let user = UserIdentity {
                user_id: generate_user_id(),
                email: None,
                display_name: None,
                is_anonymous: true,
            };
            state.users.insert(user.user_id.clone(), user.clone());
            Ok(state.issue_session(&user))
        })
    }

    /// Registers an email/password account and signs it in.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<Session, AccountError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword);
        }

        self.commit(|state| {
            if state.credentials.contains_key(&email) {
                return Err(AccountError::EmailTaken(email.clone()));
            }

            let user = UserIdentity {
                user_id: generate_user_id(),
                email: Some(email.clone()),
                display_name: display_name.filter(|n| !n.trim().is_empty()),
                is_anonymous: false,
            };
            let salt = generate_salt();
            let password_hash = hash_password(&salt, password);

            state.credentials.insert(
                email.clone(),
                Credential {
                    user_id: user.user_id.clone(),
                    salt,
                    password_hash,
                },
            );
            state.users.insert(user.user_id.clone(), user.clone());
            Ok(state.issue_session(&user))
        })
    }

    /// Verifies credentials and issues a new session.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        let email = normalize_email(email).map_err(|_| AccountError::InvalidCredentials)?;

        self.commit(|state| {
            let credential = state
                .credentials
                .get(&email)
                .ok_or(AccountError::InvalidCredentials)?;
            if !verify_password(&credential.salt, password, &credential.password_hash) {
                return Err(AccountError::InvalidCredentials);
            }

            let user = state
                .users
                .get(&credential.user_id)
                .cloned()
                .ok_or(AccountError::InvalidCredentials)?;
            Ok(state.issue_session(&user))
        })
    }

    /// Resolves a session token to its user.
    pub fn resolve(&self, token: &str) -> Option<UserIdentity> {
        let state = self.read();
        let user_id = state.sessions.get(token)?;
        state.users.get(user_id).cloned()
    }

    /// Revokes a session token. Returns false if it was not active.
    pub fn sign_out(&self, token: &str) -> Result<bool, AccountError> {
        self.commit(|state| Ok(state.sessions.remove(token).is_some()))
    }

    /// Number of known users.
    pub fn user_count(&self) -> usize {
        self.read().users.len()
    }
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(AccountError::InvalidEmail(email));
    }
    Ok(email)
}
