//! Server-side modules for the PikaWorld sync server.

pub mod accounts;
pub mod api;
pub mod documents;
pub mod storage;
pub mod tokens;

pub use accounts::{AccountError, AccountStore};
pub use api::{router, ApiError, AppState};
pub use documents::{DocumentError, DocumentStore};
pub use storage::{ServerStorage, ServerStorageError};
