//! Postgres implementation of `LocalStore`.
//!
//! One table per entity kind, named by `EntityKind::table_name()`. All SQL is
//! runtime-checked (sqlx::query, not sqlx::query!) so no database is needed
//! at compile time.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use metagov_core::error::GovError;
use metagov_core::ports::{DeleteOutcome, LocalStore, Result};
use metagov_core::types::{Entity, EntityKind, LocalId};
use metagov_core::urn::Urn;

use crate::sqlx_types::{PgEntityParams, PgEntityRow};
use crate::SCHEMA_SQL;

const COLUMNS: &str = "id, urn, name, description, owners, attributes, sync_status, last_synced_at";

pub struct PgLocalStore {
    pool: PgPool,
}

impl PgLocalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the entity tables if they do not exist.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::info!("metadata schema ready");
        Ok(())
    }
}

fn decode(kind: EntityKind, row: PgEntityRow) -> Result<Entity> {
    row.into_entity(kind)
        .map_err(|e| GovError::Internal(anyhow!(e)))
}

fn params(entity: &Entity) -> Result<PgEntityParams> {
    PgEntityParams::try_from(entity).map_err(|e| GovError::Internal(anyhow!(e)))
}

/// Unique violations on `urn` become `Conflict`; everything else is internal.
fn map_write_err(urn: &Urn, e: sqlx::Error) -> GovError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            GovError::Conflict(format!("{urn} already exists"))
        }
        _ => GovError::Internal(anyhow!(e)),
    }
}

#[async_trait]
impl LocalStore for PgLocalStore {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM {} ORDER BY id", kind.table_name());
        let rows = sqlx::query_as::<_, PgEntityRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(|r| decode(kind, r)).collect()
    }

    async fn get(&self, kind: EntityKind, id: LocalId) -> Result<Option<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", kind.table_name());
        let row = sqlx::query_as::<_, PgEntityRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| decode(kind, r)).transpose()
    }

    async fn find_by_urn(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE urn = $1", kind.table_name());
        let row = sqlx::query_as::<_, PgEntityRow>(&sql)
            .bind(urn.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| decode(kind, r)).transpose()
    }

    async fn insert(&self, entity: &Entity) -> Result<Entity> {
        let kind = entity.kind();
        let mut p = params(entity)?;
        if p.sync_status == "REMOTE_ONLY" {
            p.sync_status = "LOCAL_ONLY";
        }
        let sql = format!(
            r#"
            INSERT INTO {} (urn, name, description, owners, attributes, sync_status, last_synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#,
            kind.table_name()
        );
        let row = sqlx::query_as::<_, PgEntityRow>(&sql)
            .bind(&p.urn)
            .bind(&p.name)
            .bind(&p.description)
            .bind(&p.owners)
            .bind(&p.attributes)
            .bind(p.sync_status)
            .bind(p.last_synced_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_err(&entity.urn, e))?;
        tracing::debug!(%kind, id = row.id, urn = %entity.urn, "inserted local row");
        decode(kind, row)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity> {
        let kind = entity.kind();
        let id = entity
            .local_id
            .ok_or_else(|| GovError::MissingId(format!("update of {} without id", entity.urn)))?;
        let p = params(entity)?;
        let sql = format!(
            r#"
            UPDATE {}
            SET urn = $2, name = $3, description = $4, owners = $5, attributes = $6,
                sync_status = $7, last_synced_at = $8, updated_at = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#,
            kind.table_name()
        );
        let row = sqlx::query_as::<_, PgEntityRow>(&sql)
            .bind(id.0)
            .bind(&p.urn)
            .bind(&p.name)
            .bind(&p.description)
            .bind(&p.owners)
            .bind(&p.attributes)
            .bind(p.sync_status)
            .bind(p.last_synced_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_err(&entity.urn, e))?
            .ok_or_else(|| GovError::NotFound(format!("{kind} {id}")))?;
        decode(kind, row)
    }

    async fn delete(&self, kind: EntityKind, id: LocalId) -> Result<DeleteOutcome> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table_name());
        let result = sqlx::query(&sql)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(if result.rows_affected() == 0 {
            DeleteOutcome::AlreadyAbsent
        } else {
            DeleteOutcome::Deleted
        })
    }
}
