//! Remote document service used as a best-effort mirror.
//!
//! The remote side is a schemaless document store organised into
//! collections. Each document is owned by one user (`ownerId`) and carries a
//! server-assigned `updatedAt`.

pub mod client;
pub mod error;
pub mod protocol;

use std::future::Future;
use std::sync::Arc;

pub use client::HttpRemoteStore;
pub use error::RemoteError;
pub use protocol::{Document, RemoteWorkspace, WorkspacePayload, WORKSPACES_COLLECTION};

/// A remote collection/document service.
pub trait RemoteStore: Send + Sync {
    /// Returns true if the service answers.
    fn probe_connectivity(&self) -> impl Future<Output = bool> + Send;

    /// Writes `payload` into `collection/id`, merging with any existing
    /// document. Returns the stored document.
    fn upsert(
        &self,
        collection: &str,
        id: &str,
        payload: &Document,
    ) -> impl Future<Output = Result<Document, RemoteError>> + Send;

    /// Deletes `collection/id`. Deleting an absent document succeeds.
    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Lists documents in `collection` owned by `owner_id`.
    fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Document>, RemoteError>> + Send;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    fn probe_connectivity(&self) -> impl Future<Output = bool> + Send {
        (**self).probe_connectivity()
    }

    fn upsert(
        &self,
        collection: &str,
        id: &str,
        payload: &Document,
    ) -> impl Future<Output = Result<Document, RemoteError>> + Send {
        (**self).upsert(collection, id, payload)
    }

    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).delete(collection, id)
    }

    fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Document>, RemoteError>> + Send {
        (**self).query_by_owner(collection, owner_id)
    }
}
