//! Telephony webhook endpoints
//!
//! The provider posts form-encoded requests and expects TwiML back.

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Query, State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::TelephonyState;
use crate::telephony::{DEFAULT_CALL_SID, FALLBACK_LINE, VoiceResponse, is_terminal_status, twiml};

/// Build telephony router
pub fn router(state: Arc<TelephonyState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/make_call", get(make_call))
        .route("/voice", post(voice))
        .route("/process", post(process))
        .route("/reset", post(reset))
        .route("/status", post(status))
        .with_state(state)
}

/// Fields the provider sends with every webhook
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallForm {
    pub call_sid: Option<String>,
    pub speech_result: Option<String>,
    pub call_status: Option<String>,
}

impl CallForm {
    fn call_sid(&self) -> &str {
        self.call_sid
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CALL_SID)
    }
}

/// Tolerate bodiless or non-form posts
fn form_or_default(form: Result<Form<CallForm>, FormRejection>) -> CallForm {
    form.map(|Form(f)| f).unwrap_or_default()
}

fn twiml_response(response: &VoiceResponse) -> Response {
    (
        [(header::CONTENT_TYPE, twiml::CONTENT_TYPE)],
        response.to_xml(),
    )
        .into_response()
}

async fn index() -> &'static str {
    "Cosmetics Advisor AI ✅ Running"
}

#[derive(Debug, Deserialize)]
pub struct MakeCallQuery {
    /// Callee override; defaults to the configured user number
    pub to: Option<String>,
}

/// Trigger an outbound call; always answers with plain text
async fn make_call(
    State(state): State<Arc<TelephonyState>>,
    Query(query): Query<MakeCallQuery>,
) -> String {
    let Some(twilio) = &state.twilio else {
        return "Error: telephony credentials are not configured".to_string();
    };
    let Some(to) = query.to.or_else(|| state.to_number.clone()) else {
        return "Error: USER_PHONE_NUMBER is not configured".to_string();
    };

    match twilio
        .create_call(&to, &state.voice_url, Some(&state.status_url))
        .await
    {
        Ok(sid) => {
            state.sessions.start(&sid).await;
            format!("Calling {to}... SID: {sid}")
        }
        Err(e) => {
            tracing::error!(error = %e, %to, "failed to place call");
            format!("Error: {e}")
        }
    }
}

/// Call connected: restart the conversation and ask for a category
async fn voice(
    State(state): State<Arc<TelephonyState>>,
    form: Result<Form<CallForm>, FormRejection>,
) -> Response {
    let form = form_or_default(form);
    let call_sid = form.call_sid();

    state.sessions.start(call_sid).await;
    tracing::info!(call_sid, "call greeting");

    twiml_response(&state.dialogue.script().opening())
}

/// Caller speech (or silence) for the current stage
async fn process(
    State(state): State<Arc<TelephonyState>>,
    form: Result<Form<CallForm>, FormRejection>,
) -> Response {
    let form = form_or_default(form);
    let call_sid = form.call_sid();
    let max_reprompts = state.dialogue.script().max_reprompts;

    let (step, conversation) = state
        .sessions
        .advance(call_sid, form.speech_result.as_deref(), max_reprompts)
        .await;

    tracing::info!(
        call_sid,
        stage = ?conversation.stage,
        caller_said = form.speech_result.as_deref().unwrap_or_default(),
        step = ?step,
        "dialogue turn"
    );

    match state.dialogue.render(&step, &conversation) {
        Ok(response) => twiml_response(&response),
        Err(e) => {
            tracing::error!(call_sid, error = %e, "failed to render dialogue turn");
            let script = state.dialogue.script();
            twiml_response(
                &VoiceResponse::new(&script.voice, &script.language)
                    .say(FALLBACK_LINE)
                    .hangup(),
            )
        }
    }
}

/// Clear one call's conversation, or all of them
async fn reset(
    State(state): State<Arc<TelephonyState>>,
    form: Result<Form<CallForm>, FormRejection>,
) -> &'static str {
    let form = form_or_default(form);
    match form.call_sid.as_deref().filter(|s| !s.is_empty()) {
        Some(call_sid) => {
            state.sessions.evict(call_sid).await;
        }
        None => state.sessions.clear().await,
    }
    "Conversation reset ✅"
}

/// Provider status callback; evicts the session once the call is over
async fn status(
    State(state): State<Arc<TelephonyState>>,
    form: Result<Form<CallForm>, FormRejection>,
) -> StatusCode {
    let form = form_or_default(form);
    let call_status = form.call_status.as_deref().unwrap_or_default();
    let call_sid = form.call_sid();

    tracing::debug!(call_sid, call_status, "call status update");
    if is_terminal_status(call_status) {
        state.sessions.evict(call_sid).await;
    }

    StatusCode::NO_CONTENT
}
