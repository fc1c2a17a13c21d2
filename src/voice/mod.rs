//! Speech engines
//!
//! Hosted STT and TTS clients behind small traits, plus the transcriber that
//! turns microphone captures into text for the chat advisor.

mod stt;
mod transcribe;
mod tts;

pub use stt::{SpeechRecognizer, SpeechToText, SttProvider};
pub use transcribe::{
    Transcriber, Transcript, UNRECOGNIZED_PAYLOAD_WARNING, UNRECOGNIZED_SPEECH_WARNING,
};
pub use tts::{SpeechSynthesizer, TextToSpeech, TtsProvider};
