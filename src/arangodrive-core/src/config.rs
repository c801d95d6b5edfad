use serde::{Deserialize, Serialize};

use crate::models::Credentials;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    // Migration runner configuration
    #[serde(default)]
    pub migrations: MigrationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Database holding the tracking collection
    #[serde(default = "default_migration_database")]
    pub database: String,

    /// Collection with one record per migration name
    #[serde(default = "default_migration_collection")]
    pub collection: String,

    /// What to do when a tracking record cannot be read or written
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// FailurePolicy controls how the migration runner treats failures of its own
/// bookkeeping requests. Handler failures always abort.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed lookup, insert or update
    #[default]
    Abort,
    /// Treat a failed lookup as "not recorded", log failed writes and keep going
    BestEffort,
}

fn default_host() -> String {
    "http://localhost:8529".to_string()
}

fn default_migration_database() -> String {
    "_system".to_string()
}

fn default_migration_collection() -> String {
    "migrations".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database: default_migration_database(),
            collection: default_migration_collection(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Credentials to authenticate with, if a username is configured
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| {
            Credentials::new(username.clone(), self.password.clone().unwrap_or_default())
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: None,
            password: None,
            migrations: MigrationConfig::default(),
        }
    }
}
