//! Task records stored as Firestore documents.
//!
//! One document per task in the `tasks` collection, keyed by task id. The
//! task's JSON form is stored field by field; `created_at`/`updated_at` are
//! native timestamps so queries can order on them.
//!
//! Reads go through the ingestion normalizer, so records written by older
//! tools with loosely-shaped `scenes` or `script` still load.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use newsreel_models::ingest::{normalize_scenes, normalize_script};
use newsreel_models::{Task, TaskId, TaskStatus};

use super::client::FirestoreClient;
use super::error::FirestoreError;
use super::types::{Direction, Document, StructuredQuery, Value};
use crate::error::{StoreError, StoreResult};
use crate::store::{same_version, TaskStore};

pub const TASKS_COLLECTION: &str = "tasks";

/// Candidates fetched per claim lookup; claimed ones are filtered locally.
const CLAIM_SCAN_LIMIT: i32 = 10;

const TIMESTAMP_FIELDS: &[&str] = &["created_at", "updated_at"];

/// [`TaskStore`] on Firestore.
///
/// `replace_if` re-reads the document, checks status, claim token and
/// revision, then writes with a `currentDocument.updateTime` precondition,
/// so a concurrent writer between the read and the write is rejected by
/// the server.
#[derive(Clone)]
pub struct FirestoreTaskStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreTaskStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            collection: TASKS_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub async fn from_env() -> StoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env().await?))
    }

    async fn read(&self, id: &TaskId) -> StoreResult<Option<Document>> {
        let doc = self
            .client
            .with_retry("get_task", || {
                self.client.get_document(&self.collection, id.as_str())
            })
            .await?;
        Ok(doc)
    }

    async fn query(&self, query: StructuredQuery) -> StoreResult<Vec<Document>> {
        let docs = self
            .client
            .with_retry("query_tasks", || self.client.run_query(query.clone()))
            .await?;
        Ok(docs)
    }
}

#[async_trait]
impl TaskStore for FirestoreTaskStore {
    async fn insert(&self, task: &Task) -> StoreResult<()> {
        let fields = task_to_fields(task)?;
        match self
            .client
            .create_document(&self.collection, task.id.as_str(), fields)
            .await
        {
            Ok(_) => {
                debug!(task_id = %task.id, "Task document created");
                Ok(())
            }
            Err(FirestoreError::AlreadyExists(_)) => Err(StoreError::AlreadyExists(task.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        self.read(id).await?.map(|doc| document_to_task(&doc)).transpose()
    }

    async fn exists_with_title(&self, title: &str) -> StoreResult<bool> {
        let query = StructuredQuery::collection(&self.collection)
            .where_eq("title", title)
            .limit(1);
        Ok(!self.query(query).await?.is_empty())
    }

    async fn find_claimable(
        &self,
        status: TaskStatus,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let query = StructuredQuery::collection(&self.collection)
            .where_eq("status", status.as_str())
            .order_by("created_at", Direction::Ascending)
            .limit(CLAIM_SCAN_LIMIT);

        let docs = self.query(query).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| match document_to_task(doc) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(document = ?doc.name, "Skipping unreadable task document: {}", e);
                    None
                }
            })
            .find(|task| task.is_claimable(status, stale_before)))
    }

    async fn replace_if(&self, expected: &Task, updated: &Task) -> StoreResult<()> {
        let doc = self
            .read(&expected.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(expected.id.clone()))?;
        let stored = document_to_task(&doc)?;

        if !same_version(&stored, expected) {
            return Err(StoreError::state_conflict(&expected.id, expected.status));
        }

        let update_time = doc
            .update_time
            .as_deref()
            .ok_or_else(|| StoreError::serialization("task document has no updateTime"))?;

        match self
            .client
            .update_document_with_precondition(
                &self.collection,
                expected.id.as_str(),
                task_to_fields(updated)?,
                update_time,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_precondition_failed() => {
                debug!(task_id = %expected.id, "Task document changed between read and write");
                Err(StoreError::state_conflict(&expected.id, expected.status))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Document fields for a task. The id is the document name, not a field.
pub(crate) fn task_to_fields(task: &Task) -> StoreResult<HashMap<String, Value>> {
    let serde_json::Value::Object(map) = serde_json::to_value(task)? else {
        return Err(StoreError::serialization("task did not serialize to an object"));
    };

    Ok(map
        .into_iter()
        .filter(|(key, _)| key != "id")
        .map(|(key, json)| {
            let value = match json.as_str() {
                Some(ts) if TIMESTAMP_FIELDS.contains(&key.as_str()) => Value::TimestampValue(ts.to_string()),
                _ => Value::from_json(&json),
            };
            (key, value)
        })
        .collect())
}

/// Rebuild a task from its document, normalizing loosely-typed payloads.
pub(crate) fn document_to_task(doc: &Document) -> StoreResult<Task> {
    let id = doc
        .id()
        .ok_or_else(|| StoreError::serialization("task document has no name"))?;

    let mut map: serde_json::Map<String, serde_json::Value> = doc
        .fields
        .iter()
        .flatten()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    map.insert("id".to_string(), serde_json::Value::String(id.to_string()));

    if let Some(raw) = map.remove("scenes") {
        map.insert("scenes".to_string(), serde_json::to_value(normalize_scenes(raw))?);
    }

    if let Some(raw) = map.remove("script") {
        let script = match raw {
            serde_json::Value::Null => serde_json::Value::Null,
            other => normalize_script(&other)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        };
        map.insert("script".to_string(), script);
    }

    serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| StoreError::serialization(format!("task {}: {}", id, e)))
}
