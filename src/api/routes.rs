//! Router construction and state wiring

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, RelayState};
use crate::config::Config;
use crate::error::Result;
use crate::gemini::GeminiClient;
use crate::image::ImageAcquirer;
use crate::session::InMemorySessionStore;

/// Build the relay router
pub fn build_router(state: RelayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/process", post(handlers::process_image_and_prompt))
        .route("/api/query", get(handlers::query_prompt))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Multipart's built-in 2 MB cap is replaced by the configured limit
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Initialize the Gemini client, session store and image acquirer
pub fn init_relay_state(config: &Config) -> Result<RelayState> {
    let model = GeminiClient::new(config.gemini.clone())?;
    let images = ImageAcquirer::new(config.images.clone())?;
    let sessions = InMemorySessionStore::new(config.sessions.id_strategy);

    Ok(RelayState {
        sessions: Arc::new(sessions),
        model: Arc::new(model),
        images: Arc::new(images),
    })
}
