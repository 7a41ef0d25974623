//! Collection/document store behind `/v1/collections`.
//!
//! Documents are schemaless JSON objects. The store enforces three fields:
//! - `ownerId`: set from the authenticated user; other users cannot write
//!   or delete the document
//! - `updatedAt`: stamped with the server clock on every write
//! - `createdAt`: stamped on first write unless the payload carries one

use chrono::{DateTime, SecondsFormat, Utc};
use pikaworld_core::remote::protocol::{CREATED_AT_FIELD, OWNER_FIELD, UPDATED_AT_FIELD};
use pikaworld_core::Document;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::storage::{ServerStorage, ServerStorageError};

const DOCUMENTS_FILE: &str = "documents";

type Collection = BTreeMap<String, Document>;
type Collections = BTreeMap<String, Collection>;

/// Errors from document operations.
#[derive(Debug)]
pub enum DocumentError {
    /// The document belongs to another user.
    Forbidden { collection: String, id: String },
    /// Collection or document name is not allowed.
    InvalidName(String),
    /// Persisting the documents failed.
    Storage(ServerStorageError),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Forbidden { collection, id } => {
                write!(f, "Document {}/{} belongs to another user", collection, id)
            }
            DocumentError::InvalidName(name) => write!(f, "Invalid name: {}", name),
            DocumentError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ServerStorageError> for DocumentError {
    fn from(e: ServerStorageError) -> Self {
        match e {
            ServerStorageError::InvalidName(name) => DocumentError::InvalidName(name),
            other => DocumentError::Storage(other),
        }
    }
}

/// Thread-safe document store persisted to `documents.json`.
#[derive(Debug)]
pub struct DocumentStore {
    storage: ServerStorage,
    collections: RwLock<Collections>,
}

impl DocumentStore {
    /// Opens the store, loading any existing documents.
    pub fn open(storage: ServerStorage) -> Result<Self, ServerStorageError> {
        let collections: Collections = storage.load(DOCUMENTS_FILE)?;
        let count: usize = collections.values().map(|c| c.len()).sum();
        tracing::info!(
            "Loaded {} document(s) in {} collection(s)",
            count,
            collections.len()
        );

        Ok(Self {
            storage,
            collections: RwLock::new(collections),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }

    fn validate(collection: &str, id: &str) -> Result<(), DocumentError> {
        ServerStorage::validate_name(collection)?;
        ServerStorage::validate_name(id)?;
        Ok(())
    }

    /// Merges `payload` into `collection/id` on behalf of `owner_id`.
    ///
    /// Payload fields overwrite stored fields; fields absent from the payload
    /// are kept. Returns the stored document.
    pub fn upsert(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        payload: Document,
    ) -> Result<Document, DocumentError> {
        Self::validate(collection, id)?;

        let forbidden = || DocumentError::Forbidden {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        if payload
            .get(OWNER_FIELD)
            .is_some_and(|owner| owner.as_str() != Some(owner_id))
        {
            return Err(forbidden());
        }

        let mut collections = self.write();
        let existing = collections.get(collection).and_then(|c| c.get(id)).cloned();
        if existing
            .as_ref()
            .is_some_and(|doc| owner_of(doc) != Some(owner_id))
        {
            return Err(forbidden());
        }

        let now = Value::from(server_timestamp());
        let is_new = existing.is_none();
        let mut document = existing.unwrap_or_default();
        document.extend(payload);
        document.insert("id".to_string(), Value::from(id));
        document.insert(OWNER_FIELD.to_string(), Value::from(owner_id));
        if is_new && !document.contains_key(CREATED_AT_FIELD) {
            document.insert(CREATED_AT_FIELD.to_string(), now.clone());
        }
        document.insert(UPDATED_AT_FIELD.to_string(), now);

        let mut next = collections.clone();
        next.entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        self.storage.save(DOCUMENTS_FILE, &next)?;
        *collections = next;

        tracing::debug!("Upserted {}/{} for {}", collection, id, owner_id);
        Ok(document)
    }

    /// Deletes `collection/id` on behalf of `owner_id`.
    ///
    /// Returns false if the document did not exist.
    pub fn delete(&self, collection: &str, id: &str, owner_id: &str) -> Result<bool, DocumentError> {
        Self::validate(collection, id)?;

        let mut collections = self.write();
        let Some(existing) = collections.get(collection).and_then(|c| c.get(id)) else {
            return Ok(false);
        };
        if owner_of(existing) != Some(owner_id) {
            return Err(DocumentError::Forbidden {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        let mut next = collections.clone();
        if let Some(docs) = next.get_mut(collection) {
            docs.remove(id);
            if docs.is_empty() {
                next.remove(collection);
            }
        }
        self.storage.save(DOCUMENTS_FILE, &next)?;
        *collections = next;

        tracing::debug!("Deleted {}/{} for {}", collection, id, owner_id);
        Ok(true)
    }

    /// Gets one document.
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.read().get(collection)?.get(id).cloned()
    }

    /// Lists documents owned by `owner_id`, most recently updated first.
    pub fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Document>, DocumentError> {
        ServerStorage::validate_name(collection)?;

        let mut documents: Vec<Document> = self
            .read()
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| owner_of(doc) == Some(owner_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        documents.sort_by(|a, b| updated_at(b).cmp(&updated_at(a)));
        Ok(documents)
    }
}

fn owner_of(document: &Document) -> Option<&str> {
    document.get(OWNER_FIELD).and_then(Value::as_str)
}

fn updated_at(document: &Document) -> Option<DateTime<Utc>> {
    document
        .get(UPDATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn server_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
