//! The chat advisor pipeline
//!
//! input (typed text or microphone capture) → transcript → catalog + prompt
//! → hosted completion → optional speech.

use std::sync::Arc;

use base64::Engine;
use serde::Serialize;

use super::history::{ChatRole, ChatSessions};
use super::prompt::build_messages;
use crate::Result;
use crate::audio::decode_mic_payload;
use crate::db::ProductRepo;
use crate::llm::ChatCompletion;
use crate::voice::{SpeechSynthesizer, Transcriber, UNRECOGNIZED_PAYLOAD_WARNING};

/// Warning when audio arrives but no recognizer is configured
pub const NO_RECOGNIZER_WARNING: &str = "Speech recognition error: no speech engine configured";

/// What the user sent
#[derive(Debug, Clone)]
pub enum ChatInput {
    /// Typed query
    Text(String),
    /// Microphone widget output in any of its JSON shapes
    Audio(serde_json::Value),
    /// Encoded audio bytes uploaded as-is
    RawAudio(Vec<u8>),
}

/// Result of one chat exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatOutcome {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_mp3_base64: Option<String>,
    pub warnings: Vec<String>,
}

/// Cosmetics chat advisor
#[derive(Clone)]
pub struct ChatAdvisor {
    catalog: ProductRepo,
    llm: Arc<dyn ChatCompletion>,
    transcriber: Option<Transcriber>,
    tts: Option<Arc<dyn SpeechSynthesizer>>,
}

impl ChatAdvisor {
    /// Create an advisor answering from `catalog` with `llm`
    #[must_use]
    pub fn new(catalog: ProductRepo, llm: Arc<dyn ChatCompletion>) -> Self {
        Self {
            catalog,
            llm,
            transcriber: None,
            tts: None,
        }
    }

    /// Accept microphone input through this transcriber
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Transcriber) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Speak replies with this synthesizer
    #[must_use]
    pub fn with_tts(mut self, tts: Arc<dyn SpeechSynthesizer>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Product catalog backing the advisor
    #[must_use]
    pub const fn catalog(&self) -> &ProductRepo {
        &self.catalog
    }

    /// Answer a query from the whole in-stock catalog
    ///
    /// # Errors
    ///
    /// Returns error if the catalog query or the completion request fails
    pub async fn generate_response(&self, query: &str) -> Result<String> {
        let products = self.catalog.fetch_all()?;
        let messages = build_messages(query, &products);

        tracing::info!(products = products.len(), "requesting product advice");
        self.llm.complete(&messages).await
    }

    /// Run one chat exchange for a session
    ///
    /// Empty input produces only warnings and never reaches the model.
    ///
    /// # Errors
    ///
    /// Returns error if generating the reply fails; the user turn stays in
    /// the history
    pub async fn respond(
        &self,
        sessions: &ChatSessions,
        session_id: Option<&str>,
        input: ChatInput,
    ) -> Result<ChatOutcome> {
        let session_id = ChatSessions::resolve_id(session_id);
        let mut outcome = ChatOutcome {
            session_id: session_id.clone(),
            ..ChatOutcome::default()
        };

        let query = match input {
            ChatInput::Text(text) => text.trim().to_string(),
            ChatInput::Audio(value) if value.is_null() => String::new(),
            ChatInput::Audio(value) => match decode_mic_payload(&value) {
                Some(bytes) => self.transcribe(bytes, &mut outcome).await,
                None => {
                    outcome.warnings.push(UNRECOGNIZED_PAYLOAD_WARNING.to_string());
                    String::new()
                }
            },
            ChatInput::RawAudio(bytes) if bytes.is_empty() => {
                outcome.warnings.push(UNRECOGNIZED_PAYLOAD_WARNING.to_string());
                String::new()
            }
            ChatInput::RawAudio(bytes) => self.transcribe(bytes, &mut outcome).await,
        };

        if query.is_empty() {
            return Ok(outcome);
        }

        sessions.append(&session_id, ChatRole::User, query.as_str()).await;
        let reply = self.generate_response(&query).await?;
        sessions.append(&session_id, ChatRole::Ai, reply.as_str()).await;

        if let Some(tts) = &self.tts {
            match tts.synthesize(&reply).await {
                Ok(mp3) => {
                    outcome.audio_mp3_base64 =
                        Some(base64::engine::general_purpose::STANDARD.encode(mp3));
                }
                Err(e) => tracing::warn!(error = %e, "speech synthesis failed, replying without audio"),
            }
        }

        outcome.reply = Some(reply);
        Ok(outcome)
    }

    async fn transcribe(&self, audio: Vec<u8>, outcome: &mut ChatOutcome) -> String {
        let Some(transcriber) = &self.transcriber else {
            outcome.warnings.push(NO_RECOGNIZER_WARNING.to_string());
            return String::new();
        };

        let transcript = transcriber.transcribe(audio).await;
        if let Some(warning) = transcript.warning {
            outcome.warnings.push(warning);
        }
        if !transcript.text.is_empty() {
            outcome.transcript = Some(transcript.text.clone());
        }
        transcript.text
    }
}
