use crate::dbs::{Database, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::*;
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};

/// Document body as stored in the `data` column. Id and timestamps live in
/// their own columns and are owned by the database.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterDocument {
    name: String,
    description: String,
    skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

impl From<CreateCharacterRequest> for CharacterDocument {
    fn from(request: CreateCharacterRequest) -> Self {
        CharacterDocument {
            name: request.name,
            description: request.description,
            skills: request.skills,
            avatar_url: request.avatar_url,
        }
    }
}

fn character_from_row(row: &PgRow) -> DbResult<Character> {
    let data: Value = row.try_get("data")?;
    let document: CharacterDocument = serde_json::from_value(data)?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Character {
        id: row.try_get("id")?,
        name: document.name,
        description: document.description,
        skills: document.skills,
        avatar_url: document.avatar_url,
        created_at: Some(created_at),
        updated_at: row.try_get("updated_at")?,
    })
}

/// JSON merged into the stored document with `||`. Fields the client left out
/// are absent, a cleared avatar is an explicit `null`, and server-owned keys
/// cannot occur because the patch has no field for them.
fn merge_document(patch: &CharacterPatch) -> DbResult<Value> {
    Ok(serde_json::to_value(patch)?)
}

/// Document-database storage on PostgreSQL.
///
/// Each character is one JSONB document keyed by `(collection, id)`. The
/// database generates ids and timestamps, and every mutation is a single
/// statement, so concurrent writers to distinct documents need no extra
/// locking here.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
    collection: String,
}

impl PostgresDatabase {
    pub async fn connect(database_url: &str) -> DbResult<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        let db = Self::with_pool(pool, CHARACTERS);
        db.init().await?;
        tracing::info!("Connected to document database");
        Ok(db)
    }

    /// Wraps an existing pool. Call [`PostgresDatabase::init`] before use
    /// unless the schema is already in place.
    pub fn with_pool(pool: Pool<Postgres>, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub async fn init(&self) -> DbResult<()> {
        // gen_random_uuid() is built in from PostgreSQL 13 on.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL DEFAULT gen_random_uuid()::text,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn capabilities(&self) -> Capabilities {
        Capabilities { timestamps: true }
    }

    async fn get_characters(&self) -> DbResult<Vec<Character>> {
        let rows = sqlx::query(
            "SELECT id, data, created_at, updated_at FROM documents
             WHERE collection = $1 ORDER BY created_at, id",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(character_from_row).collect()
    }

    async fn get_character(&self, character_id: &str) -> DbResult<Option<Character>> {
        let row = sqlx::query(
            "SELECT id, data, created_at, updated_at FROM documents
             WHERE collection = $1 AND id = $2",
        )
        .bind(&self.collection)
        .bind(character_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(character_from_row).transpose()
    }

    async fn create_character(&self, request: CreateCharacterRequest) -> DbResult<Character> {
        request.validate()?;
        let data = serde_json::to_value(CharacterDocument::from(request))?;

        let row = sqlx::query(
            "INSERT INTO documents (collection, data) VALUES ($1, $2)
             RETURNING id, data, created_at, updated_at",
        )
        .bind(&self.collection)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        character_from_row(&row)
    }

    async fn update_character(
        &self,
        character_id: &str,
        patch: CharacterPatch,
    ) -> DbResult<Option<Character>> {
        patch.validate()?;
        let changes = merge_document(&patch)?;

        let row = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = now()
             WHERE collection = $1 AND id = $2
             RETURNING id, data, created_at, updated_at",
        )
        .bind(&self.collection)
        .bind(character_id)
        .bind(changes)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(character_from_row).transpose()
    }

    async fn delete_character(&self, character_id: &str) -> DbResult<Option<DeletedCharacter>> {
        let row = sqlx::query(
            "DELETE FROM documents WHERE collection = $1 AND id = $2
             RETURNING id, data, created_at, updated_at",
        )
        .bind(&self.collection)
        .bind(character_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(character_from_row)
            .transpose()?
            .map(DeletedCharacter::from))
    }
}
