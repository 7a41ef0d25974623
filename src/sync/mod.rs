//! Workspace access for the CLI, mirrored when a server is configured.
//!
//! Without `sync.server_url` every command works directly on the local
//! [`WorkspaceStore`]. With it, writes go through a [`SyncCoordinator`]
//! that mirrors them after the local write succeeds. An unreachable server
//! never fails a command; it only leaves the coordinator offline.

use std::sync::Arc;

use pikaworld_core::{
    AuthError, FileStore, HttpIdentityProvider, HttpRemoteStore, RemoteError, SyncCoordinator,
    SyncStatus, Workspace, WorkspaceError, WorkspacePatch, WorkspaceStore,
};

use crate::config::Config;

pub type HttpIdentity = Arc<HttpIdentityProvider>;
pub type CliCoordinator = SyncCoordinator<FileStore, HttpRemoteStore<HttpIdentity>, HttpIdentity>;

/// Errors building the remote clients.
#[derive(Debug)]
pub enum ConnectError {
    NotConfigured,
    Auth(AuthError),
    Remote(RemoteError),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::NotConfigured => write!(
                f,
                "Sync server not configured. Set sync.server_url in config or PIKAWORLD_SERVER_URL."
            ),
            ConnectError::Auth(e) => write!(f, "{}", e),
            ConnectError::Remote(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectError::NotConfigured => None,
            ConnectError::Auth(e) => Some(e),
            ConnectError::Remote(e) => Some(e),
        }
    }
}

impl From<AuthError> for ConnectError {
    fn from(e: AuthError) -> Self {
        ConnectError::Auth(e)
    }
}

impl From<RemoteError> for ConnectError {
    fn from(e: RemoteError) -> Self {
        ConnectError::Remote(e)
    }
}

/// Local file store under the configured data directory.
pub fn local_storage(config: &Config) -> FileStore {
    FileStore::new(config.data_dir.value.clone())
}

/// Builds the identity provider for the configured server.
///
/// The session is persisted next to the local data.
pub fn identity(config: &Config) -> Result<HttpIdentity, ConnectError> {
    let server_url = config
        .sync
        .server_url
        .as_deref()
        .ok_or(ConnectError::NotConfigured)?;

    let provider = HttpIdentityProvider::new(server_url, config.sync.remote_timeout())?
        .with_session_path(config.session_path());
    Ok(Arc::new(provider))
}

/// Builds a coordinator over the local store and initializes it.
///
/// Initialization resumes or creates a session and probes the server; on
/// failure the coordinator stays usable but offline.
pub async fn connect(config: &Config) -> Result<CliCoordinator, ConnectError> {
    let identity = identity(config)?;
    let server_url = config
        .sync
        .server_url
        .as_deref()
        .ok_or(ConnectError::NotConfigured)?;
    let remote = HttpRemoteStore::new(server_url, identity.clone(), config.sync.remote_timeout())?;

    let coordinator = SyncCoordinator::new(
        WorkspaceStore::new(local_storage(config)),
        remote,
        identity,
        config.sync.options(),
    );
    coordinator.initialize().await;
    Ok(coordinator)
}

/// Workspace operations, mirrored or local-only.
pub enum Workspaces {
    Local(WorkspaceStore<FileStore>),
    Synced(Box<CliCoordinator>),
}

impl Workspaces {
    /// Opens the mirrored variant when a server is configured.
    pub async fn open(config: &Config) -> Self {
        if !config.sync.is_configured() {
            return Workspaces::Local(WorkspaceStore::new(local_storage(config)));
        }

        match connect(config).await {
            Ok(coordinator) => Workspaces::Synced(Box::new(coordinator)),
            Err(e) => {
                tracing::warn!("Sync unavailable, working locally: {}", e);
                Workspaces::Local(WorkspaceStore::new(local_storage(config)))
            }
        }
    }

    /// The underlying local store.
    pub fn store(&self) -> &WorkspaceStore<FileStore> {
        match self {
            Workspaces::Local(store) => store,
            Workspaces::Synced(coordinator) => coordinator.store(),
        }
    }

    pub async fn create(&self, name: &str) -> Result<Workspace, WorkspaceError> {
        match self {
            Workspaces::Local(store) => store.create_workspace(name),
            Workspaces::Synced(coordinator) => coordinator.create_workspace(name).await,
        }
    }

    pub async fn update(
        &self,
        id: &str,
        patch: &WorkspacePatch,
    ) -> Result<Workspace, WorkspaceError> {
        match self {
            Workspaces::Local(store) => store.update_workspace(id, patch),
            Workspaces::Synced(coordinator) => coordinator.update_workspace(id, patch).await,
        }
    }

    pub async fn import(
        &self,
        serialized: &str,
        name: Option<&str>,
    ) -> Result<Workspace, WorkspaceError> {
        match self {
            Workspaces::Local(store) => store.import_workspace(serialized, name),
            Workspaces::Synced(coordinator) => coordinator.import_workspace(serialized, name).await,
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool, WorkspaceError> {
        match self {
            Workspaces::Local(store) => store.delete_workspace(id),
            Workspaces::Synced(coordinator) => coordinator.delete_workspace(id).await,
        }
    }

    /// Mirror status; `None` when running local-only.
    pub fn status(&self) -> Option<SyncStatus> {
        match self {
            Workspaces::Local(_) => None,
            Workspaces::Synced(coordinator) => Some(coordinator.get_autosave_status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue, SyncConfig};
    use tempfile::TempDir;

    fn config(temp: &TempDir, server_url: Option<&str>) -> Config {
        Config {
            data_dir: ConfigValue::new(temp.path().to_path_buf(), ConfigSource::Default),
            config_file: None,
            sync: SyncConfig {
                server_url: server_url.map(str::to_string),
                remote_timeout_secs: 1,
                follow_up_mirror: true,
            },
        }
    }

    #[tokio::test]
    async fn test_local_without_server() {
        let temp = TempDir::new().unwrap();
        let workspaces = Workspaces::open(&config(&temp, None)).await;

        assert!(matches!(workspaces, Workspaces::Local(_)));
        assert!(workspaces.status().is_none());

        let created = workspaces.create("Notes").await.unwrap();
        assert_eq!(
            workspaces.store().current_workspace_id().as_deref(),
            Some(created.id.as_str())
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_stays_offline() {
        let temp = TempDir::new().unwrap();
        let workspaces = Workspaces::open(&config(&temp, Some("http://127.0.0.1:9"))).await;

        assert!(matches!(workspaces, Workspaces::Synced(_)));
        let status = workspaces.status().unwrap();
        assert!(!status.is_online);

        let created = workspaces.create("Offline").await.unwrap();
        let updated = workspaces
            .update(&created.id, &WorkspacePatch::new().with_text("hello"))
            .await
            .unwrap();
        assert_eq!(updated.text_content, "hello");
        assert!(workspaces.delete(&created.id).await.unwrap());
        assert!(workspaces.status().unwrap().last_mirror_time.is_none());
    }

    #[test]
    fn test_identity_requires_server() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            identity(&config(&temp, None)),
            Err(ConnectError::NotConfigured)
        ));
    }
}
