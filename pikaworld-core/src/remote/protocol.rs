//! Wire types shared by the remote document client and `pikaworld-server`.
//!
//! Field names use camelCase to match the stored document format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Workspace;

/// Collection holding mirrored workspaces.
pub const WORKSPACES_COLLECTION: &str = "workspaces";

/// Document field naming the owning user.
pub const OWNER_FIELD: &str = "ownerId";
/// Document field stamped by the server on every write.
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Document field stamped by the server when a document is first written.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// A schemaless remote document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The fields written when mirroring a workspace.
///
/// Carries no `updatedAt`; the remote service stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePayload {
    pub id: String,
    pub name: String,
    pub text_content: String,
    pub drawing_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
}

impl WorkspacePayload {
    pub fn new(workspace: &Workspace, owner_id: impl Into<String>) -> Self {
        Self {
            id: workspace.id.clone(),
            name: workspace.name.clone(),
            text_content: workspace.text_content.clone(),
            drawing_data: workspace.drawing_data.clone(),
            created_at: workspace.created_at,
            owner_id: owner_id.into(),
        }
    }

    /// Converts the payload into a document for [`super::RemoteStore::upsert`].
    pub fn into_document(self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(document) => Ok(document),
            other => Err(serde::ser::Error::custom(format!(
                "workspace payload serialized to a non-object: {}",
                other
            ))),
        }
    }
}

/// A workspace as stored by the remote service. Never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkspace {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub drawing_data: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteWorkspace {
    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(document))
    }
}

/// Body of `POST /v1/auth/signin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /v1/auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Error body returned by the server for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
