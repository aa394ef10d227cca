use crate::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Map, Value};
use shared::models::{Character, CharacterPatch, CreateCharacterRequest, DeletedCharacter};

const CHARACTER: &str = "Character";

pub async fn list_characters(
    State(state): State<AppState>,
) -> Result<Json<Vec<Character>>, ApiError> {
    let characters = state.db.get_characters().await?;
    Ok(Json(characters))
}

pub async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
) -> Result<Json<Character>, ApiError> {
    state
        .db
        .get_character(&character_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(CHARACTER))
}

pub async fn create_character(
    State(state): State<AppState>,
    payload: Result<Json<CreateCharacterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Character>), ApiError> {
    let Json(payload) = payload?;
    let character = state.db.create_character(payload).await?;
    tracing::info!(id = %character.id, "Created character");
    Ok((StatusCode::CREATED, Json(character)))
}

pub async fn update_character(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Character>, ApiError> {
    let Json(fields) = payload?;
    let patch = CharacterPatch::from_fields(fields)?;
    state
        .db
        .update_character(&character_id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(CHARACTER))
}

pub async fn delete_character(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
) -> Result<Json<DeletedCharacter>, ApiError> {
    let deleted = state
        .db
        .delete_character(&character_id)
        .await?
        .ok_or(ApiError::NotFound(CHARACTER))?;
    tracing::info!(id = %character_id, "Deleted character");
    Ok(Json(deleted))
}
