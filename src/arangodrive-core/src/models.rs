use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// DocumentId is the identity triple ArangoDB returns for a stored document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentId {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_key", default)]
    pub key: String,
    #[serde(rename = "_rev", default)]
    pub rev: String,
}

/// Credentials are exchanged once for a JWT and not kept afterwards
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// CollectionType selects between plain document and edge collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionType {
    #[default]
    Document,
    Edge,
}

impl CollectionType {
    /// Numeric discriminator used by the collection API
    pub fn code(self) -> u8 {
        match self {
            CollectionType::Document => 2,
            CollectionType::Edge => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(CollectionType::Document),
            3 => Some(CollectionType::Edge),
            _ => None,
        }
    }
}

/// CollectionInfo is one entry of a collection listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(rename = "isSystem", default)]
    pub is_system: bool,
}

impl CollectionInfo {
    pub fn collection_type(&self) -> Option<CollectionType> {
        CollectionType::from_code(self.kind)
    }
}

/// QueryRequest is the body posted to the cursor API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub count: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub bind_vars: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            count: false,
            batch_size: None,
            bind_vars: Map::new(),
        }
    }

    pub fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Bind a query parameter. Collection parameters take a leading `@`
    /// (`@@coll` in the query text binds as `@coll`).
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }
}

/// CursorResponse is one batch returned by the cursor API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorResponse<T> {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: u16,
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// MigrationStatus is stored on each migration record. A migration without a
/// record has not started.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Started,
    Finished,
}

/// MigrationRecord is the document kept per migration in the tracking collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl MigrationRecord {
    /// A fresh record for a migration about to run
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            status: MigrationStatus::Started,
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == MigrationStatus::Finished
    }
}

/// MigrationFinished is the merge patch that closes a migration record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFinished {
    pub status: MigrationStatus,
    pub finished_at: DateTime<Utc>,
}

impl MigrationFinished {
    pub fn now() -> Self {
        Self {
            status: MigrationStatus::Finished,
            finished_at: Utc::now(),
        }
    }
}
