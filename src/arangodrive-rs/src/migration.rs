use async_trait::async_trait;

use crate::session::Session;
use crate::{ClientError, Result};
use arangodrive_core::{
    FailurePolicy, MigrationConfig, MigrationFinished, MigrationRecord, QueryRequest,
};

const FIND_MIGRATION: &str = "FOR m IN @@collection FILTER m.name == @name LIMIT 1 RETURN m";

/// A unit of setup work applied once against the database
#[async_trait]
pub trait MigrationHandler: Send + Sync {
    async fn apply(&self, session: &Session) -> anyhow::Result<()>;
}

/// Migration pairs a unique name with the handler that applies it.
///
/// The name is the only identity the runner knows: reusing a name for a
/// different handler resumes or skips according to the stored record.
pub struct Migration {
    name: String,
    handler: Box<dyn MigrationHandler>,
}

impl Migration {
    pub fn new(name: impl Into<String>, handler: impl MigrationHandler + 'static) -> Self {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

/// Outcome of one `migrate` call, names listed in processing order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Run for the first time
    pub applied: Vec<String>,
    /// Found `started` from an interrupted run and run again
    pub resumed: Vec<String>,
    /// Already `finished`
    pub skipped: Vec<String>,
    /// Bookkeeping failures ignored under `FailurePolicy::BestEffort`
    pub tolerated: Vec<String>,
}

/// Migrator applies migrations in the order given, each at most once,
/// tracking progress in a collection of the target server.
#[derive(Debug, Clone)]
pub struct Migrator {
    database: String,
    collection: String,
    policy: FailurePolicy,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            database: config.database.clone(),
            collection: config.collection.clone(),
            policy: config.failure_policy,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply every migration not yet finished.
    ///
    /// A handler error stops the run and leaves its record `started`, so the
    /// next run resumes it. Lookup and record write failures follow the
    /// configured `FailurePolicy`.
    #[tracing::instrument(
        skip(self, session, migrations),
        fields(db = %self.database, collection = %self.collection, count = migrations.len())
    )]
    pub async fn migrate(
        &self,
        session: &Session,
        migrations: &[Migration],
    ) -> Result<MigrationReport> {
        // Usually fails with a duplicate name once the collection exists
        if let Err(e) = session
            .create_collection(&self.database, &self.collection)
            .await
        {
            tracing::debug!("Tracking collection not created: {}", e);
        }

        let mut report = MigrationReport::default();

        for migration in migrations {
            let name = migration.name();
            let record = match self.find(session, name).await {
                Ok(record) => record,
                Err(e) => {
                    self.tolerate(&mut report, name, "lookup", e)?;
                    None
                }
            };

            match record {
                Some(record) if record.is_finished() => {
                    tracing::debug!(migration = name, "Already finished, skipping");
                    report.skipped.push(name.to_string());
                }
                Some(record) => {
                    tracing::info!(migration = name, id = %record.id, "Resuming interrupted migration");
                    self.run(session, migration).await?;
                    self.finish(session, &mut report, name, &record.id).await?;
                    report.resumed.push(name.to_string());
                }
                None => {
                    let started = MigrationRecord::started(name);
                    let id = match session
                        .create_document(&self.database, &self.collection, &started)
                        .await
                    {
                        Ok(id) => Some(id.id),
                        Err(e) => {
                            self.tolerate(&mut report, name, "insert", e)?;
                            None
                        }
                    };

                    tracing::info!(migration = name, "Applying migration");
                    self.run(session, migration).await?;
                    if let Some(id) = id {
                        self.finish(session, &mut report, name, &id).await?;
                    }
                    report.applied.push(name.to_string());
                }
            }
        }

        tracing::info!(
            applied = report.applied.len(),
            resumed = report.resumed.len(),
            skipped = report.skipped.len(),
            "Migrations complete"
        );
        Ok(report)
    }

    async fn find(&self, session: &Session, name: &str) -> Result<Option<MigrationRecord>> {
        let request = QueryRequest::new(FIND_MIGRATION)
            .count(true)
            .batch_size(1)
            .bind("@collection", self.collection.as_str())
            .bind("name", name);

        let cursor = session
            .query::<MigrationRecord>(&self.database, &request)
            .await?;
        Ok(cursor.result.into_iter().next())
    }

    async fn run(&self, session: &Session, migration: &Migration) -> Result<()> {
        migration
            .handler
            .apply(session)
            .await
            .map_err(|source| ClientError::Migration {
                name: migration.name.clone(),
                source,
            })
    }

    async fn finish(
        &self,
        session: &Session,
        report: &mut MigrationReport,
        name: &str,
        id: &str,
    ) -> Result<()> {
        match session
            .update_document(&self.database, id, &MigrationFinished::now())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => self.tolerate(report, name, "update", e),
        }
    }

    fn tolerate(
        &self,
        report: &mut MigrationReport,
        name: &str,
        step: &str,
        error: ClientError,
    ) -> Result<()> {
        match self.policy {
            FailurePolicy::Abort => Err(error),
            FailurePolicy::BestEffort => {
                tracing::warn!(migration = name, step, "Ignoring migration record failure: {}", error);
                report
                    .tolerated
                    .push(format!("{}: {} failed: {}", name, step, error));
                Ok(())
            }
        }
    }
}

impl Session {
    /// Apply migrations with the default tracking location (`_system/migrations`)
    /// and `FailurePolicy::Abort`
    pub async fn migrate(&self, migrations: &[Migration]) -> Result<MigrationReport> {
        Migrator::default().migrate(self, migrations).await
    }
}
