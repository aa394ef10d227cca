use crate::models::validation::{ValidationError, require_text};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Collection name used by every backend for character records.
pub const CHARACTERS: &str = "characters";

/// Server-assigned fields a client may never overwrite.
pub const PROTECTED_FIELDS: [&str; 2] = ["id", "createdAt"];

/// Fields every record must keep; an update may change them but never null them.
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "description", "skills"];

/// A stored character as seen through the storage contract.
///
/// `id` is opaque: the file backend renders its integer counter as a string,
/// the document backend hands out whatever the database generated. The
/// timestamps are only populated by backends whose [`Capabilities`] report
/// `timestamps`, so callers must not rely on them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    pub description: String,
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Character {
    /// Merge the supplied fields in place. `id` and `created_at` are untouched.
    pub fn apply(&mut self, patch: CharacterPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(skills) = patch.skills {
            self.skills = skills;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = avatar_url;
        }
    }
}

/// What a backend supports beyond the common contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Backend stamps `createdAt` on create and `updatedAt` on update.
    pub timestamps: bool,
}

// Request payloads
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharacterRequest {
    pub name: String,
    pub description: String,
    /// Must be present, may be empty.
    pub skills: Vec<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl CreateCharacterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)
    }
}

/// Partial update of a character. Only fields present in the request are set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CharacterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    /// `Some(None)` clears the avatar; it serializes as an explicit `null`.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
}

/// Keeps an explicit `null` apart from an absent key: absent falls back to
/// `default` (`None`), `null` becomes `Some(None)`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl CharacterPatch {
    /// Parse raw request fields, rejecting protected keys before anything else.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, ValidationError> {
        if let Some(field) = fields
            .keys()
            .find(|key| PROTECTED_FIELDS.contains(&key.as_str()))
        {
            return Err(ValidationError::ProtectedField(field.clone()));
        }
        if let Some(field) = REQUIRED_FIELDS
            .into_iter()
            .find(|field| fields.get(*field).is_some_and(Value::is_null))
        {
            return Err(ValidationError::MissingField(field));
        }

        let patch: Self = serde_json::from_value(Value::Object(fields))?;
        patch.validate()?;
        Ok(patch)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description)?;
        }
        Ok(())
    }
}

/// Result of a delete: the record's last known state plus the deletion marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedCharacter {
    #[serde(flatten)]
    pub character: Character,
    pub deleted: bool,
}

impl From<Character> for DeletedCharacter {
    fn from(character: Character) -> Self {
        Self {
            character,
            deleted: true,
        }
    }
}
