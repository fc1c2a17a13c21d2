//! Cosmetics Advisor - chat and telephony product advisor
//!
//! This library provides the two advisor services and the pieces they share:
//! - Product catalog access (category and budget filtered, in-stock only)
//! - Chat advisor pipeline (microphone payload, STT, prompt, hosted LLM, TTS)
//! - Telephony advisor (TwiML voice documents, per-call dialogue sessions)
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐      ┌───────────────────────────┐
//! │        Chat Advisor       │      │    Telephony Advisor      │
//! │  /api/chat  /api/products │      │ /voice /process /make_call│
//! └─────────────┬─────────────┘      └─────────────┬─────────────┘
//!               │                                  │
//! ┌─────────────▼─────────────┐      ┌─────────────▼─────────────┐
//! │ audio → STT → prompt → LLM│      │ dialogue → session store  │
//! │          → TTS            │      │        → TwiML            │
//! └─────────────┬─────────────┘      └─────────────┬─────────────┘
//!               │                                  │
//! ┌─────────────▼──────────────────────────────────▼─────────────┐
//! │                     Product Catalog (SQLite)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod telephony;
pub mod voice;

pub use audio::{MicPayload, PayloadError, decode_mic_payload};
pub use chat::{ChatAdvisor, ChatHistory, ChatInput, ChatOutcome, ChatRole, ChatSessions, ChatTurn};
pub use config::Config;
pub use db::{BudgetTier, DbConn, DbPool, Product, ProductRepo};
pub use error::{Error, Result};
pub use llm::{AzureOpenAi, ChatCompletion, ChatMessage};
pub use telephony::{Conversation, SessionStore, Stage, TwilioClient, VoiceResponse};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech, Transcriber, Transcript};
