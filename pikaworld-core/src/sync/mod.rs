//! Best-effort mirroring of local workspaces to the remote document service.

pub mod coordinator;
pub mod status;

pub use coordinator::{SyncCoordinator, SyncOptions, DEFAULT_REMOTE_TIMEOUT};
pub use status::SyncStatus;
