use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::transport::{HttpTransport, Transport};
use crate::{ClientError, Result};
use arangodrive_core::{
    is_valid_collection_name, is_valid_database_name, ClientConfig, CollectionInfo,
    CollectionType, Credentials, CursorResponse, DocumentId, QueryRequest,
};

const URL_AUTH: &str = "/_open/auth";
const URL_DATABASE: &str = "/_api/database";
const URL_COLLECTION: &str = "/_api/collection";
const URL_DOCUMENT: &str = "/_api/document";
const URL_CURSOR: &str = "/_api/cursor";

/// Session owns one transport and the JWT obtained by `connect`
pub struct Session {
    transport: Box<dyn Transport>,
}

#[derive(Deserialize)]
struct AuthResponse {
    jwt: Option<String>,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Serialize)]
struct EdgeRequest<'a> {
    #[serde(rename = "_from")]
    from: &'a str,
    #[serde(rename = "_to")]
    to: &'a str,
}

impl Session {
    /// Create a session for the given host, e.g. `http://localhost:8529/`
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_transport(HttpTransport::new(host))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.host.clone())
    }

    /// Create a session over any transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Exchange credentials for a JWT used on all later requests
    #[tracing::instrument(skip(self, password))]
    pub async fn connect(&mut self, username: &str, password: &str) -> Result<()> {
        let credentials = Credentials::new(username, password);
        let body = serde_json::to_value(&credentials)?;

        let value = self
            .transport
            .query(Method::POST, URL_AUTH, Some(&body))
            .await?;
        let auth: AuthResponse = serde_json::from_value(value)?;
        let token = auth.jwt.ok_or(ClientError::InvalidResponse)?;

        self.transport.set_jwt(token);
        tracing::debug!("Authenticated");
        Ok(())
    }

    /// List all databases
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let value = self.transport.query(Method::GET, URL_DATABASE, None).await?;
        let list: ListResponse<String> = serde_json::from_value(value)?;
        Ok(list.result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_database(&self, name: &str) -> Result<()> {
        check_database(name)?;
        self.transport
            .query(Method::POST, URL_DATABASE, Some(&json!({ "name": name })))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn drop_database(&self, name: &str) -> Result<()> {
        check_database(name)?;
        self.transport
            .delete(&format!("{}/{}", URL_DATABASE, name))
            .await?;
        Ok(())
    }

    /// Create a document collection
    pub async fn create_collection(&self, db: &str, name: &str) -> Result<()> {
        self.create_collection_of_type(db, name, CollectionType::Document)
            .await
    }

    /// Create an edge collection
    pub async fn create_edge_collection(&self, db: &str, name: &str) -> Result<()> {
        self.create_collection_of_type(db, name, CollectionType::Edge)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_collection_of_type(
        &self,
        db: &str,
        name: &str,
        collection_type: CollectionType,
    ) -> Result<()> {
        check_database(db)?;
        check_collection(name)?;
        let body = json!({ "name": name, "type": collection_type.code() });
        self.transport
            .query(Method::POST, &db_path(db, URL_COLLECTION), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn list_collections(&self, db: &str) -> Result<Vec<CollectionInfo>> {
        check_database(db)?;
        let value = self
            .transport
            .query(Method::GET, &db_path(db, URL_COLLECTION), None)
            .await?;
        let list: ListResponse<CollectionInfo> = serde_json::from_value(value)?;
        Ok(list.result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn drop_collection(&self, db: &str, name: &str) -> Result<()> {
        check_database(db)?;
        check_collection(name)?;
        let path = format!("{}/{}", db_path(db, URL_COLLECTION), name);
        self.transport.delete(&path).await?;
        Ok(())
    }

    /// Remove all documents from a collection, keeping the collection
    #[tracing::instrument(skip(self))]
    pub async fn truncate_collection(&self, db: &str, name: &str) -> Result<()> {
        check_database(db)?;
        check_collection(name)?;
        let path = format!("{}/{}/truncate", db_path(db, URL_COLLECTION), name);
        self.transport.put(&path, None).await?;
        Ok(())
    }

    /// Store a document and return its assigned identity
    #[tracing::instrument(skip(self, object))]
    pub async fn create_document<T: Serialize + ?Sized>(
        &self,
        db: &str,
        collection: &str,
        object: &T,
    ) -> Result<DocumentId> {
        check_database(db)?;
        check_collection(collection)?;
        let body = serde_json::to_value(object)?;
        self.insert(db, collection, body).await
    }

    /// Store an edge between two document ids (`collection/key`)
    #[tracing::instrument(skip(self))]
    pub async fn create_edge_document(
        &self,
        db: &str,
        edge_collection: &str,
        from: &str,
        to: &str,
    ) -> Result<DocumentId> {
        check_database(db)?;
        check_collection(edge_collection)?;
        let body = serde_json::to_value(EdgeRequest { from, to })?;
        self.insert(db, edge_collection, body).await
    }

    /// Read a document by its `collection/key` id
    pub async fn read_document<T: DeserializeOwned>(&self, db: &str, id: &str) -> Result<T> {
        check_database(db)?;
        let value = self
            .transport
            .query(Method::GET, &document_path(db, id), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Merge `object` into the stored document
    #[tracing::instrument(skip(self, object))]
    pub async fn update_document<T: Serialize + ?Sized>(
        &self,
        db: &str,
        id: &str,
        object: &T,
    ) -> Result<()> {
        check_database(db)?;
        let body = serde_json::to_value(object)?;
        self.transport.patch(&document_path(db, id), &body).await?;
        Ok(())
    }

    /// Merge a pre-serialized JSON object into the stored document
    #[tracing::instrument(skip(self, json))]
    pub async fn update_json_document(&self, db: &str, id: &str, json: &str) -> Result<()> {
        check_database(db)?;
        self.transport
            .patch_raw(&document_path(db, id), json.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Run a query and return its first batch
    #[tracing::instrument(skip(self, request), fields(batch_size = ?request.batch_size))]
    pub async fn query<T: DeserializeOwned>(
        &self,
        db: &str,
        request: &QueryRequest,
    ) -> Result<CursorResponse<T>> {
        check_database(db)?;
        let body = serde_json::to_value(request)?;
        let value = self
            .transport
            .query(Method::POST, &db_path(db, URL_CURSOR), Some(&body))
            .await?;
        decode_cursor(value)
    }

    /// Run a query without bind variables and return the first batch of results
    pub async fn aql_query<T: DeserializeOwned>(
        &self,
        db: &str,
        query: &str,
        count: bool,
        batch_size: usize,
    ) -> Result<Vec<T>> {
        let request = QueryRequest::new(query)
            .count(count)
            .batch_size(batch_size);
        let cursor = self.query(db, &request).await?;
        Ok(cursor.result)
    }

    /// Fetch the next batch of an open cursor
    pub async fn next_batch<T: DeserializeOwned>(
        &self,
        db: &str,
        cursor_id: &str,
    ) -> Result<CursorResponse<T>> {
        check_database(db)?;
        let path = format!("{}/{}", db_path(db, URL_CURSOR), cursor_id);
        let value = self.transport.query(Method::PUT, &path, None).await?;
        decode_cursor(value)
    }

    /// Run a query and drain every batch of its cursor
    pub async fn query_all<T: DeserializeOwned>(
        &self,
        db: &str,
        request: &QueryRequest,
    ) -> Result<Vec<T>> {
        let mut cursor = self.query(db, request).await?;
        let mut results = std::mem::take(&mut cursor.result);

        while cursor.has_more {
            let cursor_id = cursor.id.take().ok_or(ClientError::InvalidResponse)?;
            cursor = self.next_batch(db, &cursor_id).await?;
            results.append(&mut cursor.result);
        }

        tracing::debug!(db, rows = results.len(), "Query drained");
        Ok(results)
    }

    async fn insert(&self, db: &str, collection: &str, body: Value) -> Result<DocumentId> {
        let path = format!("{}/{}", db_path(db, URL_DOCUMENT), collection);
        let value = self
            .transport
            .query(Method::POST, &path, Some(&body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn check_database(name: &str) -> Result<()> {
    if is_valid_database_name(name) {
        Ok(())
    } else {
        Err(ClientError::InvalidName(name.to_string()))
    }
}

fn check_collection(name: &str) -> Result<()> {
    if is_valid_collection_name(name) {
        Ok(())
    } else {
        Err(ClientError::InvalidName(name.to_string()))
    }
}

fn db_path(db: &str, endpoint: &str) -> String {
    format!("/_db/{}{}", db, endpoint)
}

/// Path of a `collection/key` document id; the key is percent-encoded since
/// keys may contain `%` and other reserved characters
fn document_path(db: &str, id: &str) -> String {
    let encoded = match id.split_once('/') {
        Some((collection, key)) => format!("{}/{}", collection, encode_segment(key)),
        None => encode_segment(id),
    };
    format!("{}/{}", db_path(db, URL_DOCUMENT), encoded)
}

// Keys never contain spaces, so form encoding agrees with path encoding
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

/// Decode a cursor batch, turning `error: true` into a query failure
fn decode_cursor<T: DeserializeOwned>(value: Value) -> Result<CursorResponse<T>> {
    if value.get("error").and_then(Value::as_bool) == Some(true) {
        return Err(ClientError::Query {
            code: value
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or_default(),
            error_num: value.get("errorNum").and_then(Value::as_i64),
            message: value
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("an error occurred")
                .to_string(),
        });
    }

    Ok(serde_json::from_value(value)?)
}
