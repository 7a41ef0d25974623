//! Local store of workspaces and the current-workspace pointer.
//!
//! Workspaces are persisted as one JSON object (id -> workspace) in
//! insertion order. The current workspace id is stored separately as a
//! bare string. Readers tolerate a stale pointer; see
//! [`WorkspaceStore::get_or_create_default_workspace`].

use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Workspace, WorkspacePatch};
use crate::storage::{KeyValueStore, StorageError, StorageInfo, DEFAULT_CAPACITY_BYTES};

/// Storage key for the workspace aggregate.
pub const WORKSPACES_KEY: &str = "pikaworld_workspaces";
/// Storage key for the current workspace id.
pub const CURRENT_WORKSPACE_KEY: &str = "pikaworld_current_workspace";

/// Name given to the workspace created on first use.
pub const DEFAULT_WORKSPACE_NAME: &str = "My Workspace";
/// Name given to imports that carry no name of their own.
pub const IMPORTED_WORKSPACE_NAME: &str = "Imported Workspace";

/// Workspace id -> workspace, in insertion order.
pub type WorkspaceMap = IndexMap<String, Workspace>;

/// Errors from workspace operations.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Invalid workspace data format: {0}")]
    Format(String),
}

/// Shape accepted by [`WorkspaceStore::import_workspace`].
///
/// Identity and timestamps in the payload are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceImport {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text_content: Option<String>,
    #[serde(default)]
    drawing_data: Option<String>,
}

/// What a write does to the current workspace pointer.
enum PointerUpdate<'a> {
    Keep,
    Set(&'a str),
    Clear,
}

/// Local store of workspaces.
pub struct WorkspaceStore<S> {
    storage: S,
    capacity: u64,
}

impl<S: KeyValueStore> WorkspaceStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            capacity: DEFAULT_CAPACITY_BYTES,
        }
    }

    /// Overrides the capacity used by [`WorkspaceStore::get_storage_info`].
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Loads all workspaces for reading. Unreadable data reads as empty.
    fn load(&self) -> WorkspaceMap {
        match self.load_strict() {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("Failed to read workspaces: {}", e);
                WorkspaceMap::new()
            }
        }
    }

    /// Loads all workspaces for a read-modify-write cycle.
    fn load_strict(&self) -> Result<WorkspaceMap, WorkspaceError> {
        match self.storage.get(WORKSPACES_KEY)? {
            Some(blob) => {
                serde_json::from_str(&blob).map_err(|e| WorkspaceError::Format(e.to_string()))
            }
            None => Ok(WorkspaceMap::new()),
        }
    }

    fn save_all(&self, workspaces: &WorkspaceMap) -> Result<(), WorkspaceError> {
        let serialized = serde_json::to_string(workspaces)
            .map_err(|e| StorageError::Serialize(WORKSPACES_KEY.to_string(), e))?;
        self.storage.set(WORKSPACES_KEY, &serialized)?;
        Ok(())
    }

    /// Writes the aggregate, then applies `pointer`.
    ///
    /// If the pointer write fails, the previous aggregate is put back so
    /// the map and the pointer never disagree about a workspace.
    fn save_with_pointer(
        &self,
        workspaces: &WorkspaceMap,
        pointer: PointerUpdate<'_>,
    ) -> Result<(), WorkspaceError> {
        let previous = self.storage.get(WORKSPACES_KEY)?;
        self.save_all(workspaces)?;

        let result = match pointer {
            PointerUpdate::Keep => return Ok(()),
            PointerUpdate::Set(id) => self.storage.set(CURRENT_WORKSPACE_KEY, id),
            PointerUpdate::Clear => self.storage.remove(CURRENT_WORKSPACE_KEY),
        };

        if let Err(e) = result {
            let rollback = match previous {
                Some(blob) => self.storage.set(WORKSPACES_KEY, &blob),
                None => self.storage.remove(WORKSPACES_KEY),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!("Failed to roll back workspaces: {}", rollback_err);
            }
            return Err(e.into());
        }

        Ok(())
    }

    // ========== Current workspace pointer ==========

    /// Returns the stored current workspace id, which may be stale.
    pub fn current_workspace_id(&self) -> Option<String> {
        match self.storage.get(CURRENT_WORKSPACE_KEY) {
            Ok(id) => id.filter(|id| !id.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read current workspace id: {}", e);
                None
            }
        }
    }

    fn set_current_workspace_id(&self, id: &str) -> Result<(), WorkspaceError> {
        self.storage.set(CURRENT_WORKSPACE_KEY, id)?;
        Ok(())
    }

    /// Returns the current workspace if the pointer references one.
    pub fn current_workspace(&self) -> Option<Workspace> {
        let id = self.current_workspace_id()?;
        self.load().shift_remove(&id)
    }

    // ========== Reads ==========

    /// Gets a workspace by id.
    pub fn get_workspace(&self, id: &str) -> Option<Workspace> {
        self.load().shift_remove(id)
    }

    /// Lists all workspaces, most recently updated first.
    pub fn get_all_workspaces(&self) -> Vec<Workspace> {
        let mut workspaces: Vec<Workspace> = self.load().into_values().collect();
        workspaces.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        workspaces
    }

    // ========== Writes ==========

    /// Creates an empty workspace and makes it current.
    pub fn create_workspace(&self, name: impl Into<String>) -> Result<Workspace, WorkspaceError> {
        let mut workspaces = self.load_strict()?;
        let workspace = Workspace::new(name);

        workspaces.insert(workspace.id.clone(), workspace.clone());
        self.save_with_pointer(&workspaces, PointerUpdate::Set(&workspace.id))?;

        tracing::debug!("Created workspace {} ({})", workspace.id, workspace.name);
        Ok(workspace)
    }

    /// Merges `patch` into the workspace and refreshes `updated_at`.
    pub fn update_workspace(
        &self,
        id: &str,
        patch: &WorkspacePatch,
    ) -> Result<Workspace, WorkspaceError> {
        let mut workspaces = self.load_strict()?;
        let workspace = workspaces
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;

        patch.apply(workspace);
        workspace.updated_at = Utc::now();
        let updated = workspace.clone();

        self.save_all(&workspaces)?;
        Ok(updated)
    }

    pub fn rename_workspace(&self, id: &str, name: &str) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_name(name))
    }

    pub fn update_workspace_text(&self, id: &str, text: &str) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_text(text))
    }

    pub fn update_workspace_drawing(
        &self,
        id: &str,
        drawing: Option<String>,
    ) -> Result<Workspace, WorkspaceError> {
        self.update_workspace(id, &WorkspacePatch::new().with_drawing(drawing))
    }

    /// Deletes a workspace. Returns false if it did not exist.
    ///
    /// Clears the current pointer if it referenced the deleted workspace;
    /// no replacement is selected.
    pub fn delete_workspace(&self, id: &str) -> Result<bool, WorkspaceError> {
        let mut workspaces = self.load_strict()?;
        let removed = workspaces.shift_remove(id).is_some();
        let is_current = self.current_workspace_id().as_deref() == Some(id);

        if removed {
            let pointer = if is_current {
                PointerUpdate::Clear
            } else {
                PointerUpdate::Keep
            };
            self.save_with_pointer(&workspaces, pointer)?;
        } else if is_current {
            self.storage.remove(CURRENT_WORKSPACE_KEY)?;
        }

        Ok(removed)
    }

    /// Makes `id` the current workspace.
    pub fn switch_to_workspace(&self, id: &str) -> Result<Workspace, WorkspaceError> {
        let workspace = self
            .get_workspace(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        self.set_current_workspace_id(id)?;
        Ok(workspace)
    }

    /// Returns the current workspace, repairing the pointer if needed.
    ///
    /// - No workspaces: creates one named "My Workspace".
    /// - Pointer unset or stale: repoints to the first workspace.
    /// - Otherwise: returns the current workspace.
    ///
    /// Storage failures are logged, not returned: if the default workspace
    /// cannot be persisted, an unsaved one is returned.
    pub fn get_or_create_default_workspace(&self) -> Workspace {
        let mut workspaces = self.load();

        if let Some(current) = self
            .current_workspace_id()
            .and_then(|id| workspaces.shift_remove(&id))
        {
            return current;
        }

        if let Some((_, first)) = workspaces.shift_remove_index(0) {
            if let Err(e) = self.set_current_workspace_id(&first.id) {
                tracing::warn!("Failed to repoint current workspace: {}", e);
            }
            return first;
        }

        match self.create_workspace(DEFAULT_WORKSPACE_NAME) {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::error!("Failed to create default workspace: {}", e);
                Workspace::new(DEFAULT_WORKSPACE_NAME)
            }
        }
    }

    /// Serializes one workspace as pretty-printed JSON.
    pub fn export_workspace(&self, id: &str) -> Result<String, WorkspaceError> {
        let workspace = self
            .get_workspace(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        serde_json::to_string_pretty(&workspace)
            .map_err(|e| WorkspaceError::from(StorageError::Serialize(id.to_string(), e)))
    }

    /// Imports a workspace as a new entry with a new id and fresh timestamps.
    ///
    /// The name is `name`, else the payload's name, else
    /// "Imported Workspace". The import does not become current.
    pub fn import_workspace(
        &self,
        serialized: &str,
        name: Option<&str>,
    ) -> Result<Workspace, WorkspaceError> {
        let import: WorkspaceImport =
            serde_json::from_str(serialized).map_err(|e| WorkspaceError::Format(e.to_string()))?;

        let name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or(import.name.filter(|n| !n.is_empty()))
            .unwrap_or_else(|| IMPORTED_WORKSPACE_NAME.to_string());

        let mut workspace = Workspace::new(name);
        workspace.text_content = import.text_content.unwrap_or_default();
        workspace.drawing_data = import.drawing_data.filter(|d| !d.is_empty());

        let mut workspaces = self.load_strict()?;
        workspaces.insert(workspace.id.clone(), workspace.clone());
        self.save_all(&workspaces)?;

        tracing::info!("Imported workspace {} ({})", workspace.id, workspace.name);
        Ok(workspace)
    }

    /// Removes every workspace and the current pointer.
    pub fn clear_all_workspaces(&self) -> Result<(), WorkspaceError> {
        self.storage.remove(WORKSPACES_KEY)?;
        self.storage.remove(CURRENT_WORKSPACE_KEY)?;
        Ok(())
    }

    /// Reports the serialized size of all workspaces against the capacity.
    pub fn get_storage_info(&self) -> StorageInfo {
        let used = serde_json::to_string(&self.load())
            .map(|s| s.len() as u64)
            .unwrap_or(0);
        StorageInfo::measure(used, self.capacity)
    }
}
