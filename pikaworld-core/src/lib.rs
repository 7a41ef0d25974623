//! PikaWorld Core Library
//!
//! Local-first stores for the exercise calendar and workspaces, plus the
//! identity adapter and remote client used to mirror workspaces to
//! `pikaworld-server`.

pub mod calendar;
pub mod identity;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod workspaces;

pub use calendar::{CalendarData, CalendarError, CalendarStore};
pub use identity::{AuthError, HttpIdentityProvider, IdentityProvider, Session, UserIdentity};
pub use models::{
    date_key, days_in_month, normalize_date, parse_date_key, DateRecord, ExerciseEntry, Workspace,
    WorkspacePatch,
};
pub use remote::{
    Document, HttpRemoteStore, RemoteError, RemoteStore, RemoteWorkspace, WorkspacePayload,
    WORKSPACES_COLLECTION,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageInfo};
pub use sync::{SyncCoordinator, SyncOptions, SyncStatus};
pub use workspaces::{WorkspaceError, WorkspaceStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
