//! arangodrive Core Library
//!
//! Types shared by the arangodrive client:
//! - ArangoDB wire models (document ids, collections, cursors)
//! - Migration records kept in the tracking collection
//! - Client configuration
//! - Database and collection name rules

pub mod config;
pub mod models;
pub mod names;

// Re-export commonly used types
pub use config::{ClientConfig, FailurePolicy, MigrationConfig};
pub use models::*;
pub use names::{is_valid_collection_name, is_valid_database_name};
