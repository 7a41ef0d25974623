//! Local-first workspace writes with a best-effort remote mirror.
//!
//! Every mutation is applied to the [`WorkspaceStore`] first and returns
//! its local result. The coordinator then tries to mirror the written
//! workspace to the remote store. Mirroring never fails the caller: remote
//! errors and timeouts are logged and show up only in [`SyncStatus`].
//!
//! # Mirror State Machine
//!
//! ```text
//! Idle --mutation, online, flag clear--> Mirroring --done/failed/timeout--> Idle
//! ```
//!
//! At most one mirror write is in flight. A mutation that arrives while one
//! is in flight still applies locally; its workspace id is remembered and
//! mirrored (latest local state) once the in-flight write finishes, unless
//! follow-up mirroring is disabled.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexSet;
use tokio::task::JoinHandle;

use super::status::SyncStatus;
use crate::identity::IdentityProvider;
use crate::models::{Workspace, WorkspacePatch};
use crate::remote::{RemoteError, RemoteStore, RemoteWorkspace, WorkspacePayload, WORKSPACES_COLLECTION};
use crate::storage::KeyValueStore;
use crate::workspaces::{WorkspaceError, WorkspaceStore};

/// Default bound on any single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on each remote call, including identity initialization.
    pub remote_timeout: Duration,
    /// Mirror writes that were skipped while another mirror was in flight.
    pub follow_up_mirror: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            follow_up_mirror: true,
        }
    }
}

#[derive(Debug, Default)]
struct MirrorState {
    status: SyncStatus,
    /// Workspace ids whose mirror was skipped, in arrival order.
    pending: IndexSet<String>,
}

/// Clears `is_mirroring` when dropped, including on cancellation.
///
/// Once [`MirrorGuard::next_pending`] has released the flag, dropping the
/// guard leaves it alone, since another mirror may own it by then.
struct MirrorGuard<'a> {
    state: &'a Mutex<MirrorState>,
    released: bool,
}

impl MirrorGuard<'_> {
    /// Takes the next queued id, or releases `is_mirroring` under the same
    /// lock when there is nothing left to mirror.
    fn next_pending(&mut self) -> Option<String> {
        let mut state = lock(self.state);
        if !state.status.is_online {
            state.pending.clear();
        }

        let next = state.pending.shift_remove_index(0);
        if next.is_none() {
            state.status.is_mirroring = false;
            self.released = true;
        }
        next
    }
}

impl Drop for MirrorGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            lock(self.state).status.is_mirroring = false;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Wraps a [`WorkspaceStore`] and mirrors its mutations to a [`RemoteStore`].
pub struct SyncCoordinator<S, R, I> {
    store: WorkspaceStore<S>,
    remote: R,
    identity: I,
    options: SyncOptions,
    /// Serializes local read-modify-write cycles. Never held across `.await`.
    local: Mutex<()>,
    state: Mutex<MirrorState>,
}

impl<S, R, I> SyncCoordinator<S, R, I>
where
    S: KeyValueStore,
    R: RemoteStore,
    I: IdentityProvider,
{
    pub fn new(store: WorkspaceStore<S>, remote: R, identity: I, options: SyncOptions) -> Self {
        Self {
            store,
            remote,
            identity,
            options,
            local: Mutex::new(()),
            state: Mutex::new(MirrorState::default()),
        }
    }

    /// The wrapped local store.
    pub fn store(&self) -> &WorkspaceStore<S> {
        &self.store
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    // ========== Lifecycle ==========

    /// Initializes the identity provider, then probes connectivity once.
    ///
    /// Never fails: any problem leaves the coordinator offline.
    pub async fn initialize(&self) {
        let timeout = self.options.remote_timeout;

        match tokio::time::timeout(timeout, self.identity.initialize()).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    "Identity initialized (user: {:?}, anonymous: {})",
                    self.identity.current_user_id(),
                    self.identity.is_anonymous()
                );
            }
            Ok(Err(e)) => {
                tracing::warn!("Identity provider unavailable, working offline: {}", e);
                self.set_online(false);
                return;
            }
            Err(_) => {
                tracing::warn!(
                    "Identity provider timed out after {:?}, working offline",
                    timeout
                );
                self.set_online(false);
                return;
            }
        }

        self.check_connection().await;
    }

    /// Re-probes the remote store and records the result.
    pub async fn check_connection(&self) -> bool {
        let online = tokio::time::timeout(
            self.options.remote_timeout,
            self.remote.probe_connectivity(),
        )
        .await
        .unwrap_or(false);

        self.set_online(online);
        online
    }

    /// Spawns a task that calls [`Self::check_connection`] every `interval`.
    pub fn spawn_connection_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()>
    where
        S: 'static,
        R: 'static,
        I: 'static,
    {
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                coordinator.check_connection().await;
            }
        })
    }

    /// Returns a snapshot of the mirror state.
    pub fn get_autosave_status(&self) -> SyncStatus {
        lock(&self.state).status.clone()
    }

    fn is_online(&self) -> bool {
        lock(&self.state).status.is_online
    }

    fn set_online(&self, online: bool) {
        let mut state = lock(&self.state);
        if state.status.is_online != online {
            tracing::info!(
                "Sync server is {}",
                if online { "online" } else { "offline" }
            );
        }
        state.status.is_online = online;
    }

    fn stamp_mirror_time(&self) {
        lock(&self.state).status.last_mirror_time = Some(Utc::now());
    }

    // ========== Mutations (local write, then mirror) ==========

    pub async fn create_workspace(
        &self,
        name: impl Into<String>,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = {
            let _local = lock(&self.local);
            self.store.create_workspace(name)?
        };
        self.mirror(workspace.clone()).await;
        Ok(workspace)
    }

    pub async fn update_workspace(
        &self,
        id: &str,
        patch: &WorkspacePatch,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = {
            let _local = lock(&self.local);
            self.store.update_workspace(id, patch)?
        };
        self.mirror(workspace.clone()).await;
        Ok(workspace)
    }

    pub async fn update_workspace_text(
        &self,
        id: &str,
        text: &str,
    ) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_text(text))
            .await
    }

    pub async fn update_workspace_drawing(
        &self,
        id: &str,
        drawing: Option<String>,
    ) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_drawing(drawing))
            .await
    }

    pub async fn rename_workspace(&self, id: &str, name: &str) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_name(name))
            .await
    }

    /// Imports a workspace locally, then mirrors it like a new one.
    pub async fn import_workspace(
        &self,
        serialized: &str,
        name: Option<&str>,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = {
            let _local = lock(&self.local);
            self.store.import_workspace(serialized, name)?
        };
        self.mirror(workspace.clone()).await;
        Ok(workspace)
    }

    /// Deletes locally, then deletes the remote copy when online.
    ///
    /// The remote delete does not wait for an in-flight mirror.
    pub async fn delete_workspace(&self, id: &str) -> Result<bool, WorkspaceError> {
        let removed = {
            let _local = lock(&self.local);
            self.store.delete_workspace(id)?
        };

        let online = {
            let mut state = lock(&self.state);
            state.pending.shift_remove(id);
            state.status.is_online
        };
        if !online {
            tracing::debug!("Offline, not deleting workspace {} remotely", id);
            return Ok(removed);
        }

        match self
            .with_timeout(self.remote.delete(WORKSPACES_COLLECTION, id))
            .await
        {
            Ok(()) => {
                self.stamp_mirror_time();
                tracing::debug!("Deleted workspace {} remotely", id);
            }
            Err(e) => tracing::warn!("Failed to delete workspace {} remotely: {}", id, e),
        }

        Ok(removed)
    }

    // ========== Local-only reads and pointer changes ==========

    pub fn switch_to_workspace(&self, id: &str) -> Result<Workspace, WorkspaceError> {
        let _local = lock(&self.local);
        self.store.switch_to_workspace(id)
    }

    pub fn get_or_create_default_workspace(&self) -> Workspace {
        let _local = lock(&self.local);
        self.store.get_or_create_default_workspace()
    }

    pub fn get_all_workspaces(&self) -> Vec<Workspace> {
        self.store.get_all_workspaces()
    }

    pub fn get_workspace(&self, id: &str) -> Option<Workspace> {
        self.store.get_workspace(id)
    }

    pub fn current_workspace(&self) -> Option<Workspace> {
        self.store.current_workspace()
    }

    pub fn export_workspace(&self, id: &str) -> Result<String, WorkspaceError> {
        self.store.export_workspace(id)
    }

    /// Lists the signed-in user's mirrored workspaces, for display only.
    ///
    /// Empty when offline, unidentified, or when the query fails.
    pub async fn load_remote_workspaces(&self) -> Vec<RemoteWorkspace> {
        if !self.is_online() {
            return Vec::new();
        }
        let Some(owner_id) = self.identity.current_user_id() else {
            return Vec::new();
        };

        let documents = match self
            .with_timeout(self.remote.query_by_owner(WORKSPACES_COLLECTION, &owner_id))
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!("Failed to load remote workspaces: {}", e);
                return Vec::new();
            }
        };

        documents
            .into_iter()
            .filter_map(|doc| match RemoteWorkspace::from_document(doc) {
                Ok(workspace) => Some(workspace),
                Err(e) => {
                    tracing::warn!("Skipping malformed remote workspace: {}", e);
                    None
                }
            })
            .collect()
    }

    // ========== Mirroring ==========

    /// Mirrors `workspace`, then any follow-ups queued meanwhile.
    async fn mirror(&self, workspace: Workspace) {
        let Some(mut guard) = self.begin_mirror(&workspace.id) else {
            return;
        };

        self.mirror_one(&workspace).await;

        while let Some(id) = guard.next_pending() {
            match self.store.get_workspace(&id) {
                Some(latest) => self.mirror_one(&latest).await,
                None => tracing::debug!("Workspace {} gone before follow-up mirror", id),
            }
        }
    }

    /// Sets the mirroring flag, or records `id` for a follow-up.
    fn begin_mirror(&self, id: &str) -> Option<MirrorGuard<'_>> {
        let mut state = lock(&self.state);

        if !state.status.is_online {
            tracing::trace!("Offline, not mirroring workspace {}", id);
            return None;
        }

        if state.status.is_mirroring {
            if self.options.follow_up_mirror {
                tracing::debug!("Mirror in flight, queued workspace {} for follow-up", id);
                state.pending.insert(id.to_string());
            } else {
                tracing::debug!("Mirror in flight, skipped workspace {}", id);
            }
            return None;
        }

        state.status.is_mirroring = true;
        Some(MirrorGuard {
            state: &self.state,
            released: false,
        })
    }

    async fn mirror_one(&self, workspace: &Workspace) {
        let Some(owner_id) = self.identity.current_user_id() else {
            tracing::warn!(
                "No signed-in user, skipping mirror of workspace {}",
                workspace.id
            );
            return;
        };

        let payload = match WorkspacePayload::new(workspace, owner_id).into_document() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode workspace {}: {}", workspace.id, e);
                return;
            }
        };
        match self
            .with_timeout(self.remote.upsert(WORKSPACES_COLLECTION, &workspace.id, &payload))
            .await
        {
            Ok(_) => {
                self.stamp_mirror_time();
                tracing::debug!("Mirrored workspace {}", workspace.id);
            }
            Err(e) => tracing::warn!("Failed to mirror workspace {}: {}", workspace.id, e),
        }
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        let timeout = self.options.remote_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(RemoteError::Timeout(timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthError, UserIdentity};
    use crate::remote::Document;
    use crate::storage::MemoryStore;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::watch;

    /// In-process remote store with a gate that can hold upserts in flight.
    struct FakeRemote {
        online: AtomicBool,
        gate: watch::Sender<bool>,
        documents: Mutex<IndexMap<String, Document>>,
        upserts: Mutex<Vec<Document>>,
        deletes: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                online: AtomicBool::new(true),
                gate: watch::channel(true).0,
                documents: Mutex::new(IndexMap::new()),
                upserts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
            }
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        fn hold(&self) {
            self.gate.send_replace(false);
        }

        fn release(&self) {
            self.gate.send_replace(true);
        }

        fn upserted_texts(&self) -> Vec<String> {
            lock(&self.upserts)
                .iter()
                .map(|doc| doc["textContent"].as_str().unwrap_or_default().to_string())
                .collect()
        }

        fn upsert_count(&self) -> usize {
            lock(&self.upserts).len()
        }
    }

    impl RemoteStore for FakeRemote {
        async fn probe_connectivity(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        async fn upsert(
            &self,
            collection: &str,
            id: &str,
            payload: &Document,
        ) -> Result<Document, RemoteError> {
            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;

            if !self.online.load(Ordering::SeqCst) {
                return Err(RemoteError::Connection("offline".to_string()));
            }

            let mut stored = payload.clone();
            stored.insert(
                "updatedAt".to_string(),
                serde_json::Value::from(Utc::now().to_rfc3339()),
            );
            lock(&self.documents).insert(format!("{}/{}", collection, id), stored.clone());
            lock(&self.upserts).push(payload.clone());
            Ok(stored)
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
            lock(&self.documents).shift_remove(&format!("{}/{}", collection, id));
            lock(&self.deletes).push(id.to_string());
            Ok(())
        }

        async fn query_by_owner(
            &self,
            _collection: &str,
            owner_id: &str,
        ) -> Result<Vec<Document>, RemoteError> {
            Ok(lock(&self.documents)
                .values()
                .filter(|doc| doc["ownerId"] == owner_id)
                .cloned()
                .collect())
        }
    }

    struct FakeIdentity {
        user: Mutex<Option<UserIdentity>>,
        fail_initialize: bool,
    }

    impl FakeIdentity {
        fn signed_in(user_id: &str) -> Self {
            Self {
                user: Mutex::new(Some(UserIdentity {
                    user_id: user_id.to_string(),
                    email: None,
                    display_name: None,
                    is_anonymous: true,
                })),
                fail_initialize: false,
            }
        }

        fn signed_out() -> Self {
            Self {
                user: Mutex::new(None),
                fail_initialize: false,
            }
        }

        fn failing() -> Self {
            Self {
                user: Mutex::new(None),
                fail_initialize: true,
            }
        }
    }

    impl IdentityProvider for FakeIdentity {
        async fn initialize(&self) -> Result<(), AuthError> {
            if self.fail_initialize {
                Err(AuthError::Http("unreachable".to_string()))
            } else {
                Ok(())
            }
        }

        fn current_user(&self) -> Option<UserIdentity> {
            lock(&self.user).clone()
        }

        fn access_token(&self) -> Option<String> {
            self.current_user().map(|_| "token".to_string())
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> Result<UserIdentity, AuthError> {
            Err(AuthError::NotAuthenticated)
        }

        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            _display_name: Option<&str>,
        ) -> Result<UserIdentity, AuthError> {
            Err(AuthError::NotAuthenticated)
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            *lock(&self.user) = None;
            Ok(())
        }
    }

    type TestCoordinator = SyncCoordinator<MemoryStore, Arc<FakeRemote>, FakeIdentity>;

    fn setup_with(identity: FakeIdentity, options: SyncOptions) -> (Arc<TestCoordinator>, Arc<FakeRemote>) {
        let remote = Arc::new(FakeRemote::new());
        let coordinator = SyncCoordinator::new(
            WorkspaceStore::new(MemoryStore::new()),
            Arc::clone(&remote),
            identity,
            options,
        );
        (Arc::new(coordinator), remote)
    }

    fn setup() -> (Arc<TestCoordinator>, Arc<FakeRemote>) {
        setup_with(FakeIdentity::signed_in("user-1"), SyncOptions::default())
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_status_starts_offline() {
        let (coordinator, _remote) = setup();
        assert_eq!(coordinator.get_autosave_status(), SyncStatus::default());
    }

    #[tokio::test]
    async fn test_initialize_online_mirrors_create() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;
        assert!(coordinator.get_autosave_status().is_online);

        let ws = coordinator.create_workspace("Mirrored").await.unwrap();

        let upserts = lock(&remote.upserts).clone();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0]["id"], ws.id.as_str());
        assert_eq!(upserts[0]["ownerId"], "user-1");

        let status = coordinator.get_autosave_status();
        assert!(status.last_mirror_time.is_some());
        assert!(!status.is_mirroring);
    }

    #[tokio::test]
    async fn test_offline_writes_apply_locally_without_mirror() {
        let (coordinator, remote) = setup();
        remote.set_online(false);
        coordinator.initialize().await;

        let ws = coordinator.create_workspace("Offline").await.unwrap();
        coordinator
            .update_workspace_text(&ws.id, "local only")
            .await
            .unwrap();

        assert_eq!(remote.upsert_count(), 0);
        assert_eq!(
            coordinator.get_workspace(&ws.id).unwrap().text_content,
            "local only"
        );
        let status = coordinator.get_autosave_status();
        assert!(!status.is_online);
        assert!(status.last_mirror_time.is_none());
    }

    #[tokio::test]
    async fn test_identity_failure_degrades_to_offline() {
        let (coordinator, remote) = setup_with(FakeIdentity::failing(), SyncOptions::default());
        coordinator.initialize().await;

        assert!(!coordinator.get_autosave_status().is_online);
        coordinator.create_workspace("Still works").await.unwrap();
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_no_owner_skips_mirror() {
        let (coordinator, remote) =
            setup_with(FakeIdentity::signed_out(), SyncOptions::default());
        coordinator.initialize().await;

        coordinator.create_workspace("Nobody").await.unwrap();

        assert_eq!(remote.upsert_count(), 0);
        let status = coordinator.get_autosave_status();
        assert!(status.last_mirror_time.is_none());
        assert!(!status.is_mirroring);
    }

    #[tokio::test]
    async fn test_write_during_mirror_applies_locally_and_follows_up() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;
        let ws = coordinator.create_workspace("Busy").await.unwrap();

        remote.hold();
        let background = {
            let coordinator = Arc::clone(&coordinator);
            let id = ws.id.clone();
            tokio::spawn(async move { coordinator.update_workspace_text(&id, "one").await })
        };
        wait_until(|| coordinator.get_autosave_status().is_mirroring).await;

        coordinator
            .update_workspace_text(&ws.id, "two")
            .await
            .unwrap();
        assert_eq!(coordinator.get_workspace(&ws.id).unwrap().text_content, "two");

        remote.release();
        background.await.unwrap().unwrap();

        assert_eq!(remote.upserted_texts(), vec!["", "one", "two"]);
        assert!(!coordinator.get_autosave_status().is_mirroring);
    }

    #[tokio::test]
    async fn test_write_during_mirror_skipped_without_follow_up() {
        let options = SyncOptions {
            follow_up_mirror: false,
            ..SyncOptions::default()
        };
        let (coordinator, remote) = setup_with(FakeIdentity::signed_in("user-1"), options);
        coordinator.initialize().await;
        let ws = coordinator.create_workspace("Strict").await.unwrap();

        remote.hold();
        let background = {
            let coordinator = Arc::clone(&coordinator);
            let id = ws.id.clone();
            tokio::spawn(async move { coordinator.update_workspace_text(&id, "one").await })
        };
        wait_until(|| coordinator.get_autosave_status().is_mirroring).await;

        coordinator
            .update_workspace_text(&ws.id, "two")
            .await
            .unwrap();

        remote.release();
        background.await.unwrap().unwrap();

        assert_eq!(remote.upserted_texts(), vec!["", "one"]);
        assert_eq!(coordinator.get_workspace(&ws.id).unwrap().text_content, "two");
    }

    #[tokio::test]
    async fn test_timeout_clears_mirroring_flag() {
        let options = SyncOptions {
            remote_timeout: Duration::from_millis(50),
            ..SyncOptions::default()
        };
        let (coordinator, remote) = setup_with(FakeIdentity::signed_in("user-1"), options);
        coordinator.initialize().await;
        remote.hold();

        let ws = coordinator.create_workspace("Slow").await.unwrap();

        let status = coordinator.get_autosave_status();
        assert!(!status.is_mirroring);
        assert!(status.last_mirror_time.is_none());
        assert!(coordinator.get_workspace(&ws.id).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_mirror_clears_flag() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;
        remote.hold();

        let task = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.create_workspace("Cancelled").await })
        };
        wait_until(|| coordinator.get_autosave_status().is_mirroring).await;

        task.abort();
        let _ = task.await;

        assert!(!coordinator.get_autosave_status().is_mirroring);
        assert_eq!(coordinator.get_all_workspaces().len(), 1);
    }

    #[tokio::test]
    async fn test_released_guard_leaves_next_mirror_flag_alone() {
        let (coordinator, _remote) = setup();
        coordinator.initialize().await;

        let mut first = coordinator.begin_mirror("a").unwrap();
        assert!(coordinator.begin_mirror("b").is_none());
        assert_eq!(first.next_pending().as_deref(), Some("b"));

        // Draining the queue releases the flag under the same lock.
        assert!(first.next_pending().is_none());
        assert!(!coordinator.get_autosave_status().is_mirroring);

        // A write landing now starts its own mirror instead of queueing.
        let second = coordinator.begin_mirror("c").unwrap();
        drop(first);
        assert!(coordinator.get_autosave_status().is_mirroring);
        assert!(coordinator.begin_mirror("d").is_none());

        drop(second);
        assert!(!coordinator.get_autosave_status().is_mirroring);
    }

    #[tokio::test]
    async fn test_delete_mirrors_remotely_when_online() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;
        let ws = coordinator.create_workspace("Doomed").await.unwrap();

        assert!(coordinator.delete_workspace(&ws.id).await.unwrap());

        assert_eq!(lock(&remote.deletes).clone(), vec![ws.id.clone()]);
        assert!(coordinator.get_workspace(&ws.id).is_none());
        assert!(coordinator.load_remote_workspaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_offline_is_local_only() {
        let (coordinator, remote) = setup();
        let ws = coordinator.create_workspace("Local").await.unwrap();

        coordinator.delete_workspace(&ws.id).await.unwrap();

        assert!(lock(&remote.deletes).is_empty());
        assert!(coordinator.get_autosave_status().last_mirror_time.is_none());
    }

    #[tokio::test]
    async fn test_check_connection_updates_status() {
        let (coordinator, remote) = setup();
        remote.set_online(false);
        assert!(!coordinator.check_connection().await);

        remote.set_online(true);
        assert!(coordinator.check_connection().await);
        assert!(coordinator.get_autosave_status().is_online);
    }

    #[tokio::test]
    async fn test_connection_monitor_tracks_remote() {
        let (coordinator, remote) = setup();
        remote.set_online(true);

        let handle = coordinator.spawn_connection_monitor(Duration::from_millis(10));
        wait_until(|| coordinator.get_autosave_status().is_online).await;

        remote.set_online(false);
        wait_until(|| !coordinator.get_autosave_status().is_online).await;

        handle.abort();
    }

    #[tokio::test]
    async fn test_load_remote_workspaces_filters_by_owner() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;
        let mine = coordinator.create_workspace("Mine").await.unwrap();

        let mut foreign = Document::new();
        foreign.insert("id".to_string(), "workspace_0_other".into());
        foreign.insert("ownerId".to_string(), "user-2".into());
        foreign.insert("updatedAt".to_string(), Utc::now().to_rfc3339().into());
        lock(&remote.documents).insert("workspaces/workspace_0_other".to_string(), foreign);

        let remote_workspaces = coordinator.load_remote_workspaces().await;

        assert_eq!(remote_workspaces.len(), 1);
        assert_eq!(remote_workspaces[0].id, mine.id);
        assert_eq!(remote_workspaces[0].owner_id, "user-1");
    }

    #[tokio::test]
    async fn test_load_remote_workspaces_offline_is_empty() {
        let (coordinator, _remote) = setup();
        assert!(coordinator.load_remote_workspaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_import_mirrors_like_create() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;

        let imported = coordinator
            .import_workspace(r#"{"name":"Shared","textContent":"abc"}"#, None)
            .await
            .unwrap();

        assert_eq!(imported.name, "Shared");
        assert_eq!(remote.upserted_texts(), vec!["abc"]);
    }

    #[tokio::test]
    async fn test_local_errors_propagate() {
        let (coordinator, remote) = setup();
        coordinator.initialize().await;

        let err = coordinator
            .rename_workspace("workspace_missing", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkspaceError::NotFound(_)));
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_not_lost() {
        let (coordinator, _remote) = setup();
        let ws = coordinator.create_workspace("Counter").await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.create_workspace(format!("W{}", i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(coordinator.get_all_workspaces().len(), 9);
        assert!(coordinator.get_workspace(&ws.id).is_some());
    }
}
