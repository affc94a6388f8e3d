use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::extract::SubmitForm;
use super::models::{non_empty, ApiError, ChatResponse, HealthResponse, QueryParams};
use crate::error::{RelayError, Result};
use crate::gemini::{ModelClient, Part, Turn};
use crate::image::ImageAcquirer;
use crate::metrics::METRICS;
use crate::session::{Session, SessionStore};

/// Relay API state
#[derive(Clone)]
pub struct RelayState {
    pub sessions: Arc<dyn SessionStore>,
    pub model: Arc<dyn ModelClient>,
    pub images: Arc<ImageAcquirer>,
}

/// Submit an image and prompt
///
/// POST /api/process
pub async fn process_image_and_prompt(
    State(state): State<RelayState>,
    form: SubmitForm,
) -> std::result::Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let start = Instant::now();
    let result = submit(&state, form).await;
    finish("process", start, result)
}

/// Continue a session with a text-only prompt
///
/// GET /api/query
pub async fn query_prompt(
    State(state): State<RelayState>,
    Query(params): Query<QueryParams>,
) -> std::result::Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let start = Instant::now();
    let result = query(&state, params).await;
    finish("query", start, result)
}

/// GET /health
pub async fn health(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.len().await,
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}

async fn submit(state: &RelayState, form: SubmitForm) -> Result<ChatResponse> {
    let submission = form.into_submission()?;

    // Held until the end of the request; dropping it deletes the file.
    let image = state.images.acquire(submission.source).await?;
    let asset = state
        .model
        .upload_asset(image.path(), image.mime_type())
        .await?;

    let session = resolve_session(state, submission.session_id.as_deref()).await;

    info!(
        "Generated API URL: /gemini?prompt={}&url={}&uid={}",
        submission.prompt, asset.uri, session.id
    );

    let turn = Turn::user(vec![Part::file(&asset), Part::text(&submission.prompt)]);
    let reply = converse(state, &session.id, turn).await?;

    Ok(ChatResponse {
        response: reply,
        session_id: session.id,
    })
}

async fn query(state: &RelayState, params: QueryParams) -> Result<ChatResponse> {
    let (prompt, session_id) = match (non_empty(params.prompt), non_empty(params.session_id)) {
        (Some(prompt), Some(session_id)) => (prompt, session_id),
        _ => {
            return Err(RelayError::validation(
                "Valid session ID and prompt are required.",
            ))
        }
    };

    if state.sessions.get(&session_id).await.is_none() {
        return Err(RelayError::NotFound(session_id));
    }

    info!("Generated API URL: /gemini?prompt={}&uid={}", prompt, session_id);

    let reply = converse(state, &session_id, Turn::user(vec![Part::text(prompt)])).await?;

    Ok(ChatResponse {
        response: reply,
        session_id,
    })
}

/// Existing session for `requested`, or a fresh one
async fn resolve_session(state: &RelayState, requested: Option<&str>) -> Session {
    if let Some(id) = requested {
        if let Some(session) = state.sessions.get(id).await {
            return session;
        }
        info!("Unknown session {}, starting a new one", id);
    }
    state
        .sessions
        .create(state.model.start_conversation())
        .await
}

/// Append the user turn, ask the model, record its reply
async fn converse(state: &RelayState, session_id: &str, turn: Turn) -> Result<String> {
    let session = state.sessions.append_turn(session_id, turn).await?;
    let reply = state.model.send_message(&session.conversation).await?;
    state
        .sessions
        .append_turn(session_id, Turn::model(reply.clone()))
        .await?;
    Ok(reply)
}

fn finish(
    endpoint: &str,
    start: Instant,
    result: Result<ChatResponse>,
) -> std::result::Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    match result {
        Ok(response) => {
            METRICS.record_request(endpoint, StatusCode::OK.as_u16(), start.elapsed());
            Ok(Json(response))
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!("Relay {} failed: {}", endpoint, e);
            } else {
                warn!("Relay {} rejected: {}", endpoint, e);
            }
            METRICS.record_request(endpoint, status.as_u16(), start.elapsed());
            Err(e.into_api_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageConfig;
    use crate::gemini::{AssetReference, Conversation, GeminiError, Role};
    use crate::session::{InMemorySessionStore, SessionIdStrategy};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EchoModel {
        sends: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn upload_asset(&self, _path: &Path, mime_type: &str) -> std::result::Result<AssetReference, GeminiError> {
            Ok(AssetReference {
                name: "files/test".to_string(),
                uri: "https://files.example/test".to_string(),
                mime_type: mime_type.to_string(),
                display_name: None,
            })
        }

        async fn send_message(&self, conversation: &Conversation) -> std::result::Result<String, GeminiError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let last = conversation.last().and_then(|turn| turn.parts.last()).and_then(Part::as_text);
            Ok(format!("echo: {}", last.unwrap_or_default()))
        }
    }

    fn state() -> (RelayState, Arc<InMemorySessionStore>, Arc<EchoModel>) {
        let sessions = Arc::new(InMemorySessionStore::new(SessionIdStrategy::Sequential));
        let model = Arc::new(EchoModel::default());
        let images = Arc::new(ImageAcquirer::new(ImageConfig::default()).unwrap());
        let state = RelayState {
            sessions: sessions.clone(),
            model: model.clone(),
            images,
        };
        (state, sessions, model)
    }

    #[tokio::test]
    async fn test_query_unknown_session_is_404_without_side_effects() {
        let (state, sessions, model) = state();
        let params = QueryParams {
            prompt: Some("hello".to_string()),
            session_id: Some("9".to_string()),
        };

        let err = query(&state, params).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(sessions.is_empty().await);
        assert_eq!(model.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_missing_params_is_400() {
        let (state, _, _) = state();
        let err = query(&state, QueryParams::default()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_appends_user_and_model_turns() {
        let (state, sessions, model) = state();
        let session = sessions.create(Conversation::new()).await;

        let params = QueryParams {
            prompt: Some("what next?".to_string()),
            session_id: Some(session.id.clone()),
        };
        let response = query(&state, params).await.unwrap();

        assert_eq!(response.session_id, session.id);
        assert_eq!(response.response, "echo: what next?");
        assert_eq!(model.sends.load(Ordering::SeqCst), 1);

        let stored = sessions.get(&session.id).await.unwrap();
        assert_eq!(stored.count_role(Role::User), 1);
        assert_eq!(stored.count_role(Role::Model), 1);
    }

    #[tokio::test]
    async fn test_resolve_session_falls_back_to_new() {
        let (state, sessions, _) = state();
        let session = resolve_session(&state, Some("does-not-exist")).await;

        assert_eq!(session.id, "1");
        assert_eq!(sessions.len().await, 1);
    }
}
