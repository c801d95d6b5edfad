//! arangodrive Client Library
//!
//! Async HTTP client for the ArangoDB REST API, with a run-once migration runner.
//!
//! ```rust,no_run
//! use arangodrive::{Migration, MigrationHandler, Session};
//!
//! struct CreateUsers;
//!
//! #[async_trait::async_trait]
//! impl MigrationHandler for CreateUsers {
//!     async fn apply(&self, session: &Session) -> anyhow::Result<()> {
//!         session.create_collection("app", "users").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = Session::new("http://localhost:8529");
//!     session.connect("root", "secret").await?;
//!     session.migrate(&[Migration::new("create-users", CreateUsers)]).await?;
//!     Ok(())
//! }
//! ```

mod migration;
mod session;
mod transport;

#[cfg(test)]
mod fake;

pub use arangodrive_core::{
    ClientConfig, CollectionInfo, CollectionType, Credentials, CursorResponse, DocumentId,
    FailurePolicy, MigrationConfig, MigrationRecord, MigrationStatus, QueryRequest,
};
pub use migration::{Migration, MigrationHandler, MigrationReport, Migrator};
pub use session::Session;
pub use transport::{HttpTransport, Transport};

/// ArangoDB error number for a duplicate database or collection name
pub const ERROR_DUPLICATE_NAME: i64 = 1207;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {status} - {message}")]
    Server {
        status: u16,
        error_num: Option<i64>,
        message: String,
    },

    #[error("Query failed ({code}): {message}")]
    Query {
        code: u16,
        error_num: Option<i64>,
        message: String,
    },

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Migration {name} failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid response from server")]
    InvalidResponse,
}

impl ClientError {
    /// Build a `Server` error from a non-2xx response body, preferring the
    /// `errorMessage` ArangoDB puts in its error documents.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let error_num = parsed
            .as_ref()
            .and_then(|v| v.get("errorNum"))
            .and_then(|v| v.as_i64());
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("errorMessage"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());

        ClientError::Server {
            status,
            error_num,
            message,
        }
    }

    /// HTTP status of a `Server` error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for "duplicate name" failures, e.g. creating an existing collection
    pub fn is_conflict(&self) -> bool {
        match self {
            ClientError::Server {
                status, error_num, ..
            } => *status == 409 || *error_num == Some(ERROR_DUPLICATE_NAME),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
