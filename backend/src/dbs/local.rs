use crate::dbs::{Database, DbError, DbResult, FileStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::*;
use std::path::Path;
use tokio::sync::RwLock;

/// On-disk shape of a character. The file keeps integer ids.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct StoredCharacter {
    id: u64,
    name: String,
    description: String,
    skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

impl From<StoredCharacter> for Character {
    fn from(stored: StoredCharacter) -> Self {
        Character {
            id: stored.id.to_string(),
            name: stored.name,
            description: stored.description,
            skills: stored.skills,
            avatar_url: stored.avatar_url,
            created_at: None,
            updated_at: None,
        }
    }
}

impl StoredCharacter {
    fn with_id(id: u64, character: Character) -> Self {
        StoredCharacter {
            id,
            name: character.name,
            description: character.description,
            skills: character.skills,
            avatar_url: character.avatar_url,
        }
    }
}

/// Ids that are not integers can never exist in a file collection.
fn parse_id(character_id: &str) -> Option<u64> {
    character_id.parse().ok()
}

fn next_id(characters: &[StoredCharacter]) -> DbResult<u64> {
    match characters.iter().map(|c| c.id).max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or(DbError::IdsExhausted(CHARACTERS)),
    }
}

/// File-backed character storage.
///
/// The lock serializes mutations within this process only. Two processes
/// sharing the same directory still race: both can read the same maximum id
/// and one rewrite can clobber the other.
pub struct LocalDatabase {
    store: RwLock<FileStore>,
}

impl LocalDatabase {
    pub async fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        let store = FileStore::open(dir).await?;
        tracing::info!(dir = %store.dir().display(), "Opened local database");
        Ok(Self::new(store))
    }

    pub fn new(store: FileStore) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }
}

#[async_trait]
impl Database for LocalDatabase {
    fn capabilities(&self) -> Capabilities {
        Capabilities { timestamps: false }
    }

    async fn get_characters(&self) -> DbResult<Vec<Character>> {
        let store = self.store.read().await;
        let characters: Vec<StoredCharacter> = store.read(CHARACTERS).await?;
        Ok(characters.into_iter().map(Character::from).collect())
    }

    async fn get_character(&self, character_id: &str) -> DbResult<Option<Character>> {
        let Some(id) = parse_id(character_id) else {
            return Ok(None);
        };
        let store = self.store.read().await;
        let characters: Vec<StoredCharacter> = store.read(CHARACTERS).await?;
        Ok(characters
            .into_iter()
            .find(|c| c.id == id)
            .map(Character::from))
    }

    async fn create_character(&self, request: CreateCharacterRequest) -> DbResult<Character> {
        request.validate()?;

        let store = self.store.write().await;
        let mut characters: Vec<StoredCharacter> = store.read(CHARACTERS).await?;
        let character = StoredCharacter {
            id: next_id(&characters)?,
            name: request.name,
            description: request.description,
            skills: request.skills,
            avatar_url: request.avatar_url,
        };
        characters.push(character.clone());
        store.write(CHARACTERS, &characters).await?;

        Ok(character.into())
    }

    async fn update_character(
        &self,
        character_id: &str,
        patch: CharacterPatch,
    ) -> DbResult<Option<Character>> {
        patch.validate()?;
        let Some(id) = parse_id(character_id) else {
            return Ok(None);
        };

        let store = self.store.write().await;
        let mut characters: Vec<StoredCharacter> = store.read(CHARACTERS).await?;
        let Some(slot) = characters.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        let mut character = Character::from(slot.clone());
        character.apply(patch);
        *slot = StoredCharacter::with_id(id, character.clone());
        store.write(CHARACTERS, &characters).await?;

        Ok(Some(character))
    }

    async fn delete_character(&self, character_id: &str) -> DbResult<Option<DeletedCharacter>> {
        let Some(id) = parse_id(character_id) else {
            return Ok(None);
        };

        let store = self.store.write().await;
        let mut characters: Vec<StoredCharacter> = store.read(CHARACTERS).await?;
        let Some(index) = characters.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let removed = characters.remove(index);
        store.write(CHARACTERS, &characters).await?;

        Ok(Some(Character::from(removed).into()))
    }
}
