//! Chat advisor endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use super::ChatState;
use crate::chat::{ChatInput, ChatOutcome, ChatTurn};
use crate::db::Product;

/// Build chat router
pub fn router(state: Arc<ChatState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/audio", post(chat_audio))
        .route("/chat/{session_id}", delete(end_session))
        .route("/chat/{session_id}/history", get(history))
        .route("/products", get(products))
        .with_state(state)
}

/// Chat request: typed text, a microphone payload, or neither
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub audio: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Recorded audio takes precedence over typed text
    fn into_input(self) -> ChatInput {
        match self.audio {
            Some(audio) if !audio.is_null() => ChatInput::Audio(audio),
            _ => ChatInput::Text(self.message.unwrap_or_default()),
        }
    }
}

async fn chat(
    State(state): State<Arc<ChatState>>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatOutcome>, ChatError> {
    let Json(request) = request.map_err(|e| ChatError::BadRequest(e.body_text()))?;
    let session_id = request.session_id.clone();

    let outcome = state
        .advisor
        .respond(&state.sessions, session_id.as_deref(), request.into_input())
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub session_id: Option<String>,
}

/// Raw audio upload (WAV, MP3, Ogg, WebM or FLAC body)
async fn chat_audio(
    State(state): State<Arc<ChatState>>,
    Query(query): Query<AudioQuery>,
    body: Bytes,
) -> Result<Json<ChatOutcome>, ChatError> {
    let outcome = state
        .advisor
        .respond(
            &state.sessions,
            query.session_id.as_deref(),
            ChatInput::RawAudio(body.to_vec()),
        )
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<ChatTurn>,
}

async fn history(
    State(state): State<Arc<ChatState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ChatError> {
    let history = state
        .sessions
        .history(&session_id)
        .await
        .ok_or_else(|| ChatError::NotFound(format!("unknown session: {session_id}")))?;

    Ok(Json(HistoryResponse {
        session_id,
        turns: history.turns().to_vec(),
    }))
}

async fn end_session(
    State(state): State<Arc<ChatState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ChatError> {
    if state.sessions.end(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ChatError::NotFound(format!("unknown session: {session_id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub budget: Option<String>,
}

async fn products(
    State(state): State<Arc<ChatState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ChatError> {
    let products = state
        .advisor
        .catalog()
        .fetch_by_text(query.category.as_deref(), query.budget.as_deref())?;
    Ok(Json(products))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    BadRequest(String),
    NotFound(String),
    UpstreamFailed(String),
    Internal(String),
    /// Request budget spent; retry after this many seconds
    Throttled(u64),
}

impl From<crate::Error> for ChatError {
    fn from(err: crate::Error) -> Self {
        use crate::Error;

        match err {
            Error::Llm(_) | Error::Http(_) | Error::Stt(_) | Error::Tts(_) => {
                tracing::error!(error = %err, "upstream service failed");
                Self::UpstreamFailed(err.to_string())
            }
            Error::NotFound(msg) => Self::NotFound(msg),
            other => {
                tracing::error!(error = %other, "chat request failed");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let retry_after = match &self {
            Self::Throttled(secs) => Some(*secs),
            _ => None,
        };

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::UpstreamFailed(msg) => (StatusCode::BAD_GATEWAY, "upstream_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            Self::Throttled(secs) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!("too many requests, retry in {secs}s"),
            ),
        };

        let mut response =
            (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
