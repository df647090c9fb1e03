use sqlx::PgPool;

use crate::config::PostgresStoreConfig;

/// Run database migrations, creating the vector extension, tables, and
/// indexes if they do not exist. Idempotent; safe to run on every start.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(
    pool: &PgPool,
    config: &PostgresStoreConfig,
) -> Result<(), sqlx::Error> {
    let resources = config.resources_table();
    let records = config.records_table();
    let schemas = config.schemas_table();
    let terraform = config.terraform_table();
    let prefix = &config.table_prefix;
    let dimension = config.vector_dimension;
    let lists = config.ann_lists;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    let create_resources = format!(
        "CREATE TABLE IF NOT EXISTS {resources} (
            id          TEXT PRIMARY KEY,
            type        TEXT NOT NULL,
            provider    TEXT NOT NULL,
            name        TEXT NOT NULL,
            data        JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            metadata    JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            vector      vector({dimension}),
            parent_id   TEXT REFERENCES {resources}(id) ON DELETE SET NULL,
            created_at  TIMESTAMPTZ NOT NULL,
            modified_at TIMESTAMPTZ NOT NULL
        )"
    );

    // Chain rows are kept after the resource row is deleted, so there is
    // deliberately no foreign key from resource_id to the resources table.
    let create_records = format!(
        "CREATE TABLE IF NOT EXISTS {records} (
            id            TEXT PRIMARY KEY,
            resource_id   TEXT NOT NULL,
            operation     TEXT NOT NULL,
            changes       JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            timestamp     TIMESTAMPTZ NOT NULL,
            actor         TEXT NOT NULL,
            previous_hash TEXT NOT NULL DEFAULT '',
            data_hash     TEXT NOT NULL,
            signature     TEXT NOT NULL DEFAULT ''
        )"
    );

    let create_schemas = format!(
        "CREATE TABLE IF NOT EXISTS {schemas} (
            name        TEXT NOT NULL,
            provider    TEXT NOT NULL,
            type        TEXT NOT NULL,
            version     INTEGER NOT NULL,
            schema      JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            description TEXT NOT NULL DEFAULT '',
            created_at  TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (name, provider)
        )"
    );

    let create_terraform = format!(
        "CREATE TABLE IF NOT EXISTS {terraform} (
            key        TEXT PRIMARY KEY,
            path       TEXT NOT NULL,
            data       JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            metadata   JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )"
    );

    for stmt in [
        &create_resources,
        &create_records,
        &create_schemas,
        &create_terraform,
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    let indexes = [
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}resources_provider ON {resources} (provider)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}resources_type ON {resources} (type)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}resources_parent ON {resources} (parent_id) WHERE parent_id IS NOT NULL"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}resources_created ON {resources} (created_at)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}resources_data ON {resources} USING GIN (data)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}resources_metadata ON {resources} USING GIN (metadata)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}resources_vector ON {resources} \
             USING ivfflat (vector vector_cosine_ops) WITH (lists = {lists})"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}records_resource_time ON {records} (resource_id, timestamp)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}terraform_path ON {terraform} (path)"),
    ];

    for idx in &indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}
