//! Plugin descriptor persistence.
//!
//! Manages the `plugin` table which tracks which bundles are installed,
//! their declared version, and whether their backing code has gone
//! missing.

use anyhow::Result;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use pulse_plugin_api::PluginDescriptor;

/// Create the `plugin` table if it does not exist yet.
pub async fn ensure_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS plugin (\
            id BIGSERIAL PRIMARY KEY, \
            name VARCHAR(191) NOT NULL UNIQUE, \
            author TEXT NOT NULL DEFAULT '', \
            version VARCHAR(64) NOT NULL, \
            bundle VARCHAR(191) NOT NULL DEFAULT '', \
            description TEXT NOT NULL DEFAULT '', \
            integrations JSONB NOT NULL DEFAULT '[]', \
            is_missing BOOLEAN NOT NULL DEFAULT FALSE, \
            installed_at BIGINT NOT NULL, \
            updated_at BIGINT NOT NULL)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn descriptor_from_row(row: &sqlx::postgres::PgRow) -> Result<PluginDescriptor> {
    let integrations: Json<Vec<String>> = row.try_get("integrations")?;

    Ok(PluginDescriptor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        author: row.try_get("author")?,
        version: row.try_get("version")?,
        bundle: row.try_get("bundle")?,
        description: row.try_get("description")?,
        integrations: integrations.0.into_iter().collect(),
        is_missing: row.try_get("is_missing")?,
    })
}

/// Get all persisted plugin descriptors, ordered by name.
pub async fn get_all(pool: &PgPool) -> Result<Vec<PluginDescriptor>> {
    let rows = sqlx::query(
        "SELECT id, name, author, version, bundle, description, integrations, is_missing \
         FROM plugin ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(descriptor_from_row).collect()
}

/// Get one persisted descriptor by plugin name.
pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Option<PluginDescriptor>> {
    let row = sqlx::query(
        "SELECT id, name, author, version, bundle, description, integrations, is_missing \
         FROM plugin WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(descriptor_from_row).transpose()
}

/// Names of all installed plugins.
pub async fn installed_names(pool: &PgPool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM plugin ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|r| r.get("name")).collect())
}

/// Persist a new descriptor. Returns the assigned row id.
pub async fn insert(pool: &PgPool, descriptor: &PluginDescriptor) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    let integrations: Vec<String> = descriptor.integrations.iter().cloned().collect();

    let row = sqlx::query(
        "INSERT INTO plugin \
            (name, author, version, bundle, description, integrations, is_missing, \
             installed_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
         RETURNING id",
    )
    .bind(&descriptor.name)
    .bind(&descriptor.author)
    .bind(&descriptor.version)
    .bind(&descriptor.bundle)
    .bind(&descriptor.description)
    .bind(Json(integrations))
    .bind(descriptor.is_missing)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

/// Record a new declared version for an installed plugin.
pub async fn update_version(pool: &PgPool, name: &str, version: &str) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "UPDATE plugin SET version = $1, is_missing = FALSE, updated_at = $2 WHERE name = $3",
    )
    .bind(version)
    .bind(now)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Flag a persisted plugin whose backing bundle is no longer present.
pub async fn set_missing(pool: &PgPool, name: &str, missing: bool) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query("UPDATE plugin SET is_missing = $1, updated_at = $2 WHERE name = $3")
        .bind(missing)
        .bind(now)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a plugin record entirely.
pub async fn remove(pool: &PgPool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM plugin WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
