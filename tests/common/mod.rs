//! Shared test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, Request, Response, StatusCode, header},
    routing::post,
};
use cosmetics_advisor::api::{ChatServer, ChatState, TelephonyServer, TelephonyState, throttle::ChatThrottle};
use cosmetics_advisor::telephony::{Dialogue, DialogueScript, TwilioClient};
use cosmetics_advisor::{
    ChatAdvisor, ChatCompletion, ChatMessage, ChatSessions, DbPool, Error, ProductRepo, Result,
    SessionStore, SpeechRecognizer, SpeechSynthesizer, Transcriber, db,
};

/// Public URL the telephony fixtures are reachable at
pub const PUBLIC_URL: &str = "https://advisor.test";

/// In-memory catalog seeded with fixture products
///
/// Medium lipsticks outnumber the read-back limit; foundation is out of
/// stock everywhere.
#[must_use]
pub fn seeded_catalog() -> DbPool {
    let pool = db::init_memory().expect("failed to init test db");
    pool.get()
        .expect("failed to get connection")
        .execute_batch(
            r"
            INSERT INTO products (name, brand, shade, category, price, stock) VALUES
                ('Matte Red', 'Lakme', 'Crimson', 'lipstick', 450, 10),
                ('Velvet Nude', 'Maybelline', 'Nude', 'lipstick', 500, 3),
                ('Ruby Gloss', 'Sugar', 'Ruby', 'lipstick', 899, 7),
                ('Mauve Muse', 'Nykaa', 'Mauve', 'lipstick', 999, 2),
                ('Berry Stain', 'Lakme', 'Berry', 'lipstick', 1200, 4),
                ('Coral Crush', 'Sugar', 'Coral', 'lipstick', 1400, 1),
                ('Rose Satin', 'MAC', 'Rose', 'lipstick', 1500, 6),
                ('Gold Couture', 'Dior', 'Gold', 'lipstick', 2500, 2),
                ('Sold Out Red', 'Lakme', 'Red', 'lipstick', 700, 0),
                ('Day Cream', 'Ponds', NULL, 'cream', 299, 12),
                ('Night Repair', 'Olay', NULL, 'cream', 1800, 5),
                ('Silk Foundation', 'Maybelline', 'Ivory', 'foundation', 650, 0);
            ",
        )
        .expect("failed to seed catalog");
    pool
}

/// Completion engine that records requests and returns a fixed reply
pub struct StubLlm {
    pub reply: Option<String>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for StubLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| Error::Llm("deployment unavailable".to_string()))
    }
}

/// Recognizer that hears a fixed phrase
pub struct StubRecognizer(pub &'static str);

#[async_trait]
impl SpeechRecognizer for StubRecognizer {
    async fn recognize(&self, audio_path: &Path) -> Result<String> {
        assert!(audio_path.exists(), "recognizer called without an audio file");
        Ok(self.0.to_string())
    }
}

/// Synthesizer producing a fake MP3 body
pub struct StubSynthesizer;

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(format!("ID3{text}").into_bytes())
    }
}

/// Chat router over the seeded catalog
pub fn chat_app(
    llm: Arc<StubLlm>,
    recognizer: Option<&'static str>,
    rate_limit_rpm: Option<u32>,
) -> (Router, ChatSessions) {
    let pool = seeded_catalog();
    let mut advisor = ChatAdvisor::new(ProductRepo::new(pool.clone()), llm)
        .with_tts(Arc::new(StubSynthesizer));
    if let Some(phrase) = recognizer {
        advisor = advisor.with_transcriber(Transcriber::new(Arc::new(StubRecognizer(phrase))));
    }

    let sessions = ChatSessions::new();
    let state = ChatState {
        db: pool,
        advisor,
        sessions: sessions.clone(),
        throttle: rate_limit_rpm.map(ChatThrottle::per_minute),
    };
    (ChatServer::new(state, 0).router(), sessions)
}

/// Call script used by the telephony fixtures
#[must_use]
pub fn script(max_reprompts: u32) -> DialogueScript {
    DialogueScript {
        store_name: "Glow Beauty".to_string(),
        voice: "alice".to_string(),
        language: "en-IN".to_string(),
        process_url: format!("{PUBLIC_URL}/process"),
        gather_timeout: 5,
        max_reprompts,
        readback_limit: 5,
    }
}

/// Telephony router over the seeded catalog
pub fn telephony_app(max_reprompts: u32) -> (Router, SessionStore) {
    telephony_app_with(max_reprompts, None, None)
}

/// Telephony router with an outbound call client and default callee
pub fn telephony_app_with(
    max_reprompts: u32,
    twilio: Option<TwilioClient>,
    to_number: Option<&str>,
) -> (Router, SessionStore) {
    let pool = seeded_catalog();
    let sessions = SessionStore::default();
    let state = TelephonyState {
        db: pool.clone(),
        dialogue: Dialogue::new(script(max_reprompts), ProductRepo::new(pool)),
        sessions: sessions.clone(),
        twilio,
        to_number: to_number.map(ToString::to_string),
        voice_url: format!("{PUBLIC_URL}/voice"),
        status_url: format!("{PUBLIC_URL}/status"),
    };
    (TelephonyServer::new(state, 0).router(), sessions)
}

/// Build a form-encoded POST request
pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a JSON POST request
pub fn json_post(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as text
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Number the Calls API mock refuses, like an unverified trial destination
pub const REJECTED_NUMBER: &str = "+15005550001";

/// One request received by the Calls API mock
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub account_sid: String,
    pub authorized: bool,
    pub form: HashMap<String, String>,
}

pub type CallLog = Arc<Mutex<Vec<CallRequest>>>;

async fn mock_create_call(
    State(log): State<CallLog>,
    UrlPath(account_sid): UrlPath<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    let rejected = form.get("To").map(String::as_str) == Some(REJECTED_NUMBER);
    log.lock().unwrap().push(CallRequest {
        account_sid,
        authorized,
        form,
    });

    if rejected {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "code": 21211,
                "message": "Invalid 'To' Phone Number",
                "status": 400,
            })),
        )
    } else {
        (
            StatusCode::CREATED,
            Json(serde_json::json!({ "sid": "CA0123456789", "status": "queued" })),
        )
    }
}

/// Local stand-in for the Calls API; returns its base URL and request log
pub async fn mock_calls_api() -> (String, CallLog) {
    let log = CallLog::default();
    let app = Router::new()
        .route("/Accounts/{account_sid}/Calls.json", post(mock_create_call))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), log)
}

/// Outbound call client pointed at a Calls API mock
pub fn mock_twilio(api_base: &str) -> TwilioClient {
    TwilioClient::new(
        "AC-test".to_string(),
        secrecy::SecretString::from("token".to_string()),
        "+15550001111".to_string(),
    )
    .unwrap()
    .with_api_base(api_base)
}
