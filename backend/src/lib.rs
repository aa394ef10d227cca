pub mod dbs;
pub mod error;
mod handlers;
pub mod rate_limit;

use crate::dbs::Database;
use crate::handlers::{
    create_character, delete_character, get_character, list_characters, update_character,
};
use crate::rate_limit::{RateLimiter, rate_limit};
use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, limiter: Arc<RateLimiter>) -> Self {
        Self { db, limiter }
    }
}

/// Mounts the character API on `router`. Every route sits behind the limiter.
pub fn init(router: Router<AppState>, state: AppState) -> Router<()> {
    router
        .route("/health", get(|| async { "OK" }))
        .route("/characters", get(list_characters).post(create_character))
        .route(
            "/characters/{id}",
            get(get_character)
                .put(update_character)
                .delete(delete_character),
        )
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
