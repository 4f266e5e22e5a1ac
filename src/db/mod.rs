//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for the catalog, entities and their content entries.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::content::catalog::seed_templates;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    seed_catalog(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS component_templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            type TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            title TEXT,
            description TEXT,
            parent_id TEXT REFERENCES entities(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (kind, slug)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_personas (
            service_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            persona_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            PRIMARY KEY (service_id, persona_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Entry order is insertion order: listings sort by rowid.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_entries (
            id TEXT PRIMARY KEY,
            parent_kind TEXT NOT NULL,
            parent_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            component_id TEXT NOT NULL REFERENCES component_templates(id),
            data TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_entities_kind_name ON entities(kind, name);
        CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(parent_id);
        CREATE INDEX IF NOT EXISTS idx_entries_parent ON content_entries(parent_kind, parent_id);
        CREATE INDEX IF NOT EXISTS idx_entries_component ON content_entries(component_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert the built-in templates if they are missing.
async fn seed_catalog(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for template in seed_templates() {
        sqlx::query(
            "INSERT OR IGNORE INTO component_templates (id, name, description, type) VALUES (?, ?, ?, ?)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.kind.as_str())
        .execute(pool)
        .await?;
    }
    Ok(())
}
