use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;
use tracing::debug;

use stratus_audit::{ChainAppender, ChangeRecord, Operation};
use stratus_core::{
    CloudProvider, Resource, ResourceMetadata, ResourceSchema, SearchQuery, TerraformKey,
};
use stratus_store::{InventoryStore, NewChange, StoreError};

use crate::config::PostgresStoreConfig;
use crate::migrations;

/// Build `PgConnectOptions` from a [`PostgresStoreConfig`], applying SSL
/// settings when configured.
pub(crate) fn build_connect_options(
    config: &PostgresStoreConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StoreError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// PostgreSQL-backed implementation of [`InventoryStore`].
///
/// Uses `sqlx::PgPool` for connection pooling and the `pgvector` extension
/// for the embedding column and its cosine operator.
pub struct PostgresStore {
    pool: PgPool,
    config: Arc<PostgresStoreConfig>,
    appender: ChainAppender,
}

impl PostgresStore {
    /// Create a new `PostgresStore` from the provided configuration.
    ///
    /// Connects to `PostgreSQL`, creates the connection pool, and runs
    /// migrations to ensure the vector extension and tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresStoreConfig) -> Result<Self, StoreError> {
        Self::with_appender(config, ChainAppender::new()).await
    }

    /// Create a `PostgresStore` whose audit records are built by the given
    /// appender (for signed chains).
    pub async fn with_appender(
        config: PostgresStoreConfig,
        appender: ChainAppender,
    ) -> Result<Self, StoreError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config, appender).await
    }

    /// Create a `PostgresStore` from an existing pool. Runs migrations on
    /// creation.
    pub async fn from_pool(
        pool: PgPool,
        config: PostgresStoreConfig,
        appender: ChainAppender,
    ) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            appender,
        })
    }

    fn check_vector(&self, resource: &Resource) -> Result<(), StoreError> {
        if let Some(vector) = &resource.vector {
            if vector.len() != self.config.vector_dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.config.vector_dimension,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// Map a write-path sqlx failure to the store taxonomy using the
    /// standard Postgres error codes.
    fn classify_write(error: &sqlx::Error, resource: &Resource) -> StoreError {
        if let sqlx::Error::Database(db_err) = error {
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::Duplicate(resource.id.clone()),
                Some("23503") => {
                    return StoreError::ForeignKey(
                        resource.parent_id.clone().unwrap_or_default(),
                    );
                }
                _ => {}
            }
        }
        StoreError::Backend(error.to_string())
    }

    /// Read the current chain tip hash for a resource, inside the caller's
    /// transaction.
    async fn tip_hash(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        resource_id: &str,
    ) -> Result<String, StoreError> {
        let sql = format!(
            "SELECT data_hash FROM {} WHERE resource_id = $1 ORDER BY timestamp DESC LIMIT 1",
            self.config.records_table()
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(resource_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.map(|(hash,)| hash).unwrap_or_default())
    }

    /// Append the audit record for a mutation, inside the caller's
    /// transaction, after the target row has been locked.
    async fn append_record(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        resource_id: &str,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        let previous_hash = self.tip_hash(tx, resource_id).await?;
        let record = self.appender.next_record(
            resource_id,
            change.operation,
            change.changes,
            &change.actor,
            &previous_hash,
        )?;

        let sql = format!(
            "INSERT INTO {} (id, resource_id, operation, changes, timestamp, actor, \
             previous_hash, data_hash, signature) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.config.records_table()
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.resource_id)
            .bind(record.operation.to_string())
            .bind(
                serde_json::to_value(&record.changes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            )
            .bind(record.timestamp)
            .bind(&record.actor)
            .bind(&record.previous_hash)
            .bind(&record.data_hash)
            .bind(&record.signature)
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(record)
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn create_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        self.check_vector(resource)?;
        let metadata = serde_json::to_value(&resource.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let sql = format!(
            "INSERT INTO {} (id, type, provider, name, data, metadata, vector, parent_id, \
             created_at, modified_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            self.config.resources_table()
        );
        sqlx::query(&sql)
            .bind(&resource.id)
            .bind(&resource.resource_type)
            .bind(resource.provider.as_str())
            .bind(&resource.name)
            .bind(serde_json::Value::Object(resource.data.clone()))
            .bind(metadata)
            .bind(resource.vector.clone().map(pgvector::Vector::from))
            .bind(&resource.parent_id)
            .bind(resource.created_at)
            .bind(resource.modified_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::classify_write(&e, resource))?;

        let record = self.append_record(&mut tx, &resource.id, change).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(resource_id = %resource.id, "resource created");
        Ok(record)
    }

    async fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE id = $1",
            self.config.resources_table()
        );
        let row: Option<ResourceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(Resource::try_from).transpose()
    }

    async fn update_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        self.check_vector(resource)?;
        let metadata = serde_json::to_value(&resource.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Row lock first: serializes same-resource appends and pins the
        // stored created_at, which wins over whatever the caller supplied.
        let lock_sql = format!(
            "SELECT created_at FROM {} WHERE id = $1 FOR UPDATE",
            self.config.resources_table()
        );
        let locked: Option<(DateTime<Utc>,)> = sqlx::query_as(&lock_sql)
            .bind(&resource.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let Some((created_at,)) = locked else {
            return Err(StoreError::NotFound(resource.id.clone()));
        };

        let sql = format!(
            "UPDATE {} SET type = $2, provider = $3, name = $4, data = $5, metadata = $6, \
             vector = $7, parent_id = $8, created_at = $9, modified_at = $10 WHERE id = $1",
            self.config.resources_table()
        );
        sqlx::query(&sql)
            .bind(&resource.id)
            .bind(&resource.resource_type)
            .bind(resource.provider.as_str())
            .bind(&resource.name)
            .bind(serde_json::Value::Object(resource.data.clone()))
            .bind(metadata)
            .bind(resource.vector.clone().map(pgvector::Vector::from))
            .bind(&resource.parent_id)
            .bind(created_at)
            .bind(resource.modified_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::classify_write(&e, resource))?;

        let record = self.append_record(&mut tx, &resource.id, change).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(resource_id = %resource.id, "resource updated");
        Ok(record)
    }

    async fn delete_resource(
        &self,
        id: &str,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let lock_sql = format!(
            "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
            self.config.resources_table()
        );
        let locked: Option<(String,)> = sqlx::query_as(&lock_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if locked.is_none() {
            return Err(StoreError::NotFound(id.to_owned()));
        }

        let sql = format!(
            "DELETE FROM {} WHERE id = $1",
            self.config.resources_table()
        );
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let record = self.append_record(&mut tx, id, change).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(resource_id = %id, "resource deleted, chain retained");
        Ok(record)
    }

    async fn list_resources(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError> {
        self.run_list_query(query, false).await
    }

    async fn text_search(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError> {
        self.run_list_query(query, true).await
    }

    async fn vector_search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Resource, f32)>, StoreError> {
        if vector.len() != self.config.vector_dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.vector_dimension,
                actual: vector.len(),
            });
        }

        // `<=>` is pgvector's cosine distance; ordering by it directly keeps
        // the ivfflat index usable.
        let sql = format!(
            "SELECT *, 1 - (vector <=> $1) AS similarity FROM {} \
             WHERE vector IS NOT NULL AND 1 - (vector <=> $1) > $2 \
             ORDER BY vector <=> $1 LIMIT $3",
            self.config.resources_table()
        );

        let rows = sqlx::query(&sql)
            .bind(pgvector::Vector::from(vector.to_vec()))
            .bind(f64::from(threshold))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let similarity: f64 = row
                .try_get("similarity")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let resource_row = ResourceRow::from_pg_row(&row)?;
            #[allow(clippy::cast_possible_truncation)]
            hits.push((Resource::try_from(resource_row)?, similarity as f32));
        }
        Ok(hits)
    }

    async fn get_by_parent(&self, parent_id: &str) -> Result<Vec<Resource>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE parent_id = $1 ORDER BY created_at DESC",
            self.config.resources_table()
        );
        let rows: Vec<ResourceRow> = sqlx::query_as(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(Resource::try_from).collect()
    }

    async fn get_chain(&self, resource_id: &str) -> Result<Vec<ChangeRecord>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE resource_id = $1 ORDER BY timestamp ASC",
            self.config.records_table()
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(ChangeRecord::try_from).collect()
    }

    async fn latest_record(
        &self,
        resource_id: &str,
    ) -> Result<Option<ChangeRecord>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE resource_id = $1 ORDER BY timestamp DESC LIMIT 1",
            self.config.records_table()
        );
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(ChangeRecord::try_from).transpose()
    }

    async fn put_schema(&self, schema: &ResourceSchema) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (name, provider, type, version, schema, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (name, provider) DO UPDATE SET \
             type = EXCLUDED.type, version = EXCLUDED.version, schema = EXCLUDED.schema, \
             description = EXCLUDED.description",
            self.config.schemas_table()
        );
        sqlx::query(&sql)
            .bind(&schema.name)
            .bind(schema.provider.as_str())
            .bind(&schema.resource_type)
            .bind(i64::from(schema.version))
            .bind(serde_json::Value::Object(schema.schema.clone()))
            .bind(&schema.description)
            .bind(schema.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_schema(
        &self,
        name: &str,
        provider: CloudProvider,
    ) -> Result<Option<ResourceSchema>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE name = $1 AND provider = $2",
            self.config.schemas_table()
        );
        let row: Option<SchemaRow> = sqlx::query_as(&sql)
            .bind(name)
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(ResourceSchema::try_from).transpose()
    }

    async fn list_schemas(&self) -> Result<Vec<ResourceSchema>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY name, provider",
            self.config.schemas_table()
        );
        let rows: Vec<SchemaRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(ResourceSchema::try_from).collect()
    }

    async fn delete_schema(
        &self,
        name: &str,
        provider: CloudProvider,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE name = $1 AND provider = $2",
            self.config.schemas_table()
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(provider.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn put_terraform_key(&self, key: &TerraformKey) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (key, path, data, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (key) DO UPDATE SET \
             path = EXCLUDED.path, data = EXCLUDED.data, metadata = EXCLUDED.metadata, \
             updated_at = NOW()",
            self.config.terraform_table()
        );
        sqlx::query(&sql)
            .bind(&key.key)
            .bind(&key.path)
            .bind(serde_json::Value::Object(key.data.clone()))
            .bind(serde_json::Value::Object(key.metadata.clone()))
            .bind(key.created_at)
            .bind(key.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_terraform_key(&self, key: &str) -> Result<Option<TerraformKey>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE key = $1",
            self.config.terraform_table()
        );
        let row: Option<TerraformRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.map(TerraformKey::from))
    }

    async fn list_terraform_keys(
        &self,
        path_prefix: &str,
    ) -> Result<Vec<TerraformKey>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE path LIKE $1 ORDER BY key",
            self.config.terraform_table()
        );
        let rows: Vec<TerraformRow> = sqlx::query_as(&sql)
            .bind(format!("{path_prefix}%"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(TerraformKey::from).collect())
    }

    async fn delete_terraform_key(&self, key: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE key = $1",
            self.config.terraform_table()
        );
        let result = sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    fn vector_dimension(&self) -> usize {
        self.config.vector_dimension
    }
}

impl PostgresStore {
    /// Shared implementation for list and text queries: same filters, same
    /// ordering, text adds a case-insensitive substring predicate.
    async fn run_list_query(
        &self,
        query: &SearchQuery,
        with_text: bool,
    ) -> Result<Vec<Resource>, StoreError> {
        let (where_clause, binds, mut bind_idx) = build_where_clause(query, with_text);

        let limit_idx = bind_idx;
        bind_idx += 1;
        let offset_idx = bind_idx;

        let sql = format!(
            "SELECT * FROM {} {where_clause} ORDER BY {} {} LIMIT ${limit_idx} OFFSET ${offset_idx}",
            self.config.resources_table(),
            query.sort_by.as_column(),
            query.sort_order.as_sql(),
        );

        let mut q = sqlx::query_as::<_, ResourceRow>(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        q = q.bind(i64::from(query.effective_limit()));
        q = q.bind(i64::from(query.effective_offset()));

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(Resource::try_from).collect()
    }
}

/// Build the WHERE clause and bind values for a list/text query. All binds
/// are text; column and sort names come from fixed enums, never from caller
/// strings.
fn build_where_clause(query: &SearchQuery, with_text: bool) -> (String, Vec<String>, u32) {
    let mut conditions = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;

    if let Some(provider) = query.provider {
        conditions.push(format!("provider = ${bind_idx}"));
        binds.push(provider.as_str().to_owned());
        bind_idx += 1;
    }
    if let Some(resource_type) = &query.resource_type {
        conditions.push(format!("type = ${bind_idx}"));
        binds.push(resource_type.clone());
        bind_idx += 1;
    }

    for (key, value) in &query.filters {
        match key.as_str() {
            "region" | "environment" | "cost_center" => {
                conditions.push(format!("metadata->>'{key}' = ${bind_idx}"));
                binds.push(value.clone());
                bind_idx += 1;
            }
            _ => {
                if let Some(tag) = key.strip_prefix("tag:") {
                    // Both the tag name and value are bound, never spliced.
                    conditions.push(format!(
                        "metadata->'tags'->>${bind_idx} = ${}",
                        bind_idx + 1
                    ));
                    binds.push(tag.to_owned());
                    binds.push(value.clone());
                    bind_idx += 2;
                }
            }
        }
    }

    if with_text {
        if let Some(text) = query.text.as_deref().filter(|t| !t.is_empty()) {
            conditions.push(format!(
                "(name ILIKE ${bind_idx} OR data::text ILIKE ${bind_idx})"
            ));
            binds.push(format!("%{text}%"));
            bind_idx += 1;
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, binds, bind_idx)
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Internal row type for mapping database rows to [`Resource`].
#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    #[sqlx(rename = "type")]
    resource_type: String,
    provider: String,
    name: String,
    data: serde_json::Value,
    metadata: serde_json::Value,
    vector: Option<pgvector::Vector>,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl ResourceRow {
    /// Manual extraction for queries that select extra computed columns
    /// (e.g. `similarity`), where `query_as` cannot be used.
    fn from_pg_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let get = |name: &str| StoreError::Backend(format!("missing column {name}"));
        Ok(Self {
            id: row.try_get("id").map_err(|_| get("id"))?,
            resource_type: row.try_get("type").map_err(|_| get("type"))?,
            provider: row.try_get("provider").map_err(|_| get("provider"))?,
            name: row.try_get("name").map_err(|_| get("name"))?,
            data: row.try_get("data").map_err(|_| get("data"))?,
            metadata: row.try_get("metadata").map_err(|_| get("metadata"))?,
            vector: row.try_get("vector").map_err(|_| get("vector"))?,
            parent_id: row.try_get("parent_id").map_err(|_| get("parent_id"))?,
            created_at: row.try_get("created_at").map_err(|_| get("created_at"))?,
            modified_at: row.try_get("modified_at").map_err(|_| get("modified_at"))?,
        })
    }
}

impl TryFrom<ResourceRow> for Resource {
    type Error = StoreError;

    fn try_from(row: ResourceRow) -> Result<Self, StoreError> {
        let provider: CloudProvider = row
            .provider
            .parse()
            .map_err(|e: stratus_core::ValidationError| StoreError::Serialization(e.to_string()))?;
        let metadata: ResourceMetadata = serde_json::from_value(row.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let data = match row.data {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        Ok(Self {
            id: row.id,
            resource_type: row.resource_type,
            provider,
            name: row.name,
            data,
            metadata,
            vector: row.vector.map(|v| v.to_vec()),
            parent_id: row.parent_id,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

/// Internal row type for mapping database rows to [`ChangeRecord`].
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    resource_id: String,
    operation: String,
    changes: serde_json::Value,
    timestamp: DateTime<Utc>,
    actor: String,
    previous_hash: String,
    data_hash: String,
    signature: String,
}

impl TryFrom<RecordRow> for ChangeRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, StoreError> {
        let operation = match row.operation.as_str() {
            "CREATE" => Operation::Create,
            "UPDATE" => Operation::Update,
            "DELETE" => Operation::Delete,
            other => {
                return Err(StoreError::Serialization(format!(
                    "unknown operation: {other}"
                )));
            }
        };
        let changes = serde_json::from_value(row.changes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            id: row.id,
            resource_id: row.resource_id,
            operation,
            changes,
            timestamp: row.timestamp,
            actor: row.actor,
            previous_hash: row.previous_hash,
            data_hash: row.data_hash,
            signature: row.signature,
        })
    }
}

/// Internal row type for mapping database rows to [`ResourceSchema`].
#[derive(sqlx::FromRow)]
struct SchemaRow {
    name: String,
    provider: String,
    #[sqlx(rename = "type")]
    resource_type: String,
    version: i64,
    schema: serde_json::Value,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SchemaRow> for ResourceSchema {
    type Error = StoreError;

    fn try_from(row: SchemaRow) -> Result<Self, StoreError> {
        let provider: CloudProvider = row
            .provider
            .parse()
            .map_err(|e: stratus_core::ValidationError| StoreError::Serialization(e.to_string()))?;
        let schema = match row.schema {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        Ok(Self {
            name: row.name,
            provider,
            resource_type: row.resource_type,
            version: u32::try_from(row.version).unwrap_or(0),
            schema,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for mapping database rows to [`TerraformKey`].
#[derive(sqlx::FromRow)]
struct TerraformRow {
    key: String,
    path: String,
    data: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TerraformRow> for TerraformKey {
    fn from(row: TerraformRow) -> Self {
        let as_map = |value: serde_json::Value| match value {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            key: row.key,
            path: row.path,
            data: as_map(row.data),
            metadata: as_map(row.metadata),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{SortBy, SortOrder};

    #[test]
    fn where_clause_orders_binds() {
        let query = SearchQuery::default()
            .with_provider(CloudProvider::Aws)
            .with_resource_type("aws.ec2.instance")
            .with_filter("region", "us-east-1")
            .with_filter("tag:team", "platform");
        let (clause, binds, next_idx) = build_where_clause(&query, false);

        assert!(clause.starts_with("WHERE "));
        assert!(clause.contains("provider = $1"));
        assert!(clause.contains("type = $2"));
        assert!(clause.contains("metadata->>'region' = $3"));
        assert!(clause.contains("metadata->'tags'->>$4 = $5"));
        assert_eq!(
            binds,
            vec!["aws", "aws.ec2.instance", "us-east-1", "team", "platform"]
        );
        assert_eq!(next_idx, 6);
    }

    #[test]
    fn text_predicate_appends_pattern() {
        let query = SearchQuery::default().with_text("cache");
        let (clause, binds, _) = build_where_clause(&query, true);
        assert!(clause.contains("name ILIKE $1 OR data::text ILIKE $1"));
        assert_eq!(binds, vec!["%cache%"]);

        // The needle is ignored for plain lists.
        let (clause, binds, _) = build_where_clause(&query, false);
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn sort_enums_produce_sql_identifiers() {
        assert_eq!(SortBy::ModifiedAt.as_column(), "modified_at");
        assert_eq!(SortOrder::Asc.as_sql(), "ASC");
    }
}
