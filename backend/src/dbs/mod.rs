use async_trait::async_trait;
use shared::models::{
    Capabilities, Character, CharacterPatch, CreateCharacterRequest, DeletedCharacter,
    ValidationError,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod file_store;
pub mod local;
pub mod postgres;

pub use file_store::FileStore;
pub use local::LocalDatabase;
pub use postgres::PostgresDatabase;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Debug)]
pub enum DatabaseConfig {
    Local { path: PathBuf },
    Postgres { url: String },
}

impl DatabaseConfig {
    pub async fn connect(&self) -> DbResult<Arc<dyn Database>> {
        match self {
            DatabaseConfig::Local { path } => Ok(Arc::new(LocalDatabase::open(path).await?)),
            DatabaseConfig::Postgres { url } => Ok(Arc::new(PostgresDatabase::connect(url).await?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseConfig::Local { .. } => "local",
            DatabaseConfig::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("No ids left in collection {0}")]
    IdsExhausted(&'static str),
}

/// Storage contract shared by every backend.
///
/// Ids are opaque strings here; each backend decides how they are generated.
/// A missing id is reported as `Ok(None)`, never as an error. Whether the
/// returned records carry `createdAt`/`updatedAt` depends on
/// [`Database::capabilities`].
#[async_trait]
pub trait Database: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Every character in storage order. Empty if nothing was stored yet.
    async fn get_characters(&self) -> DbResult<Vec<Character>>;
    async fn get_character(&self, character_id: &str) -> DbResult<Option<Character>>;
    /// Validates the request, assigns the id and persists the record.
    async fn create_character(&self, request: CreateCharacterRequest) -> DbResult<Character>;
    async fn update_character(
        &self,
        character_id: &str,
        patch: CharacterPatch,
    ) -> DbResult<Option<Character>>;
    async fn delete_character(&self, character_id: &str) -> DbResult<Option<DeletedCharacter>>;
}
