//! Migration Runner Example
//!
//! Connects to an ArangoDB server, applies two migrations and prints the report.
//! Running it a second time skips both.
//!
//! Run with: cargo run -p arangodrive-rs --example run_migrations
//!
//! Reads `arangodrive.json` from the working directory if present, e.g.
//! `{"host": "http://localhost:8529", "username": "root", "password": "secret"}`

use arangodrive::{ClientConfig, Migration, MigrationHandler, Migrator, Session};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const APP_DB: &str = "bookshelf";

struct CreateSchema;

#[async_trait::async_trait]
impl MigrationHandler for CreateSchema {
    async fn apply(&self, session: &Session) -> anyhow::Result<()> {
        session.create_database(APP_DB).await?;
        session.create_collection(APP_DB, "authors").await?;
        session.create_collection(APP_DB, "books").await?;
        session.create_edge_collection(APP_DB, "wrote").await?;
        Ok(())
    }
}

struct SeedAuthors;

#[async_trait::async_trait]
impl MigrationHandler for SeedAuthors {
    async fn apply(&self, session: &Session) -> anyhow::Result<()> {
        let author = session
            .create_document(APP_DB, "authors", &json!({ "name": "Ursula K. Le Guin" }))
            .await?;
        let book = session
            .create_document(APP_DB, "books", &json!({ "title": "The Dispossessed" }))
            .await?;
        session
            .create_edge_document(APP_DB, "wrote", &author.id, &book.id)
            .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arangodrive=debug,run_migrations=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    let config = ClientConfig::load("arangodrive.json").unwrap_or_else(|_| {
        tracing::warn!("Failed to load arangodrive.json, using defaults");
        ClientConfig::default()
    });
    tracing::info!("Host: {}", config.host);

    let mut session = Session::from_config(&config);
    if let Some(credentials) = config.credentials() {
        session
            .connect(&credentials.username, &credentials.password)
            .await?;
        tracing::info!("✓ Authenticated as {}", credentials.username);
    }

    let migrations = [
        Migration::new("001-create-schema", CreateSchema),
        Migration::new("002-seed-authors", SeedAuthors),
    ];
    let report = Migrator::from_config(&config.migrations)
        .migrate(&session, &migrations)
        .await?;

    println!("applied: {:?}", report.applied);
    println!("resumed: {:?}", report.resumed);
    println!("skipped: {:?}", report.skipped);

    let books: Vec<serde_json::Value> = session
        .aql_query(APP_DB, "FOR b IN books RETURN b.title", true, 100)
        .await?;
    println!("books: {:?}", books);

    Ok(())
}
