//! Microphone audio → transcript, with user-facing warnings
//!
//! Every failure along the way ends in an empty transcript plus a warning
//! string; nothing here returns an error to the caller.

use std::io::Write;
use std::sync::Arc;

use super::SpeechRecognizer;
use crate::audio::{ContainerFormat, normalize_to_wav};

/// Warning shown when the payload shape is not understood
pub const UNRECOGNIZED_PAYLOAD_WARNING: &str = "Unrecognized microphone output format.";

/// Warning shown when the engine heard nothing it could transcribe
pub const UNRECOGNIZED_SPEECH_WARNING: &str =
    "Could not recognize speech. Please try again or type your query.";

/// Result of a transcription attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Recognized text, trimmed; empty on any failure
    pub text: String,
    /// User-facing warning when `text` is empty
    pub warning: Option<String>,
}

impl Transcript {
    fn heard(text: String) -> Self {
        Self {
            text,
            warning: None,
        }
    }

    fn failed(warning: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            warning: Some(warning.into()),
        }
    }

    /// Whether any speech was recognized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Normalizes captured audio and feeds it to a recognizer
#[derive(Clone)]
pub struct Transcriber {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl Transcriber {
    /// Create a transcriber over a recognition engine
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Transcribe encoded audio bytes
    ///
    /// WAV and MP3 are normalized to the speech profile first. Ogg, WebM and
    /// FLAC go to the engine untouched under a matching file extension. The
    /// upload lives in a temporary file for exactly the duration of the
    /// recognition call and is removed when it goes out of scope.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Transcript {
        let format = ContainerFormat::sniff(&audio);
        let (upload, format) = if format.is_engine_native() {
            tracing::debug!(format = format.name(), bytes = audio.len(), "passing audio to engine as-is");
            (audio, format)
        } else {
            match tokio::task::spawn_blocking(move || normalize_to_wav(&audio)).await {
                Ok(Ok(wav)) => (wav, ContainerFormat::Wav),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "could not decode microphone audio");
                    return Transcript::failed(format!("Could not decode audio: {e}"));
                }
                Err(e) => {
                    tracing::error!(error = %e, "audio normalization task failed");
                    return Transcript::failed(format!("Could not decode audio: {e}"));
                }
            }
        };

        let file = match write_temp_audio(&upload, format.extension()) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, "failed to write temporary audio file");
                return Transcript::failed(format!("Could not decode audio: {e}"));
            }
        };

        let result = self.recognizer.recognize(file.path()).await;
        if let Err(e) = file.close() {
            tracing::debug!(error = %e, "failed to remove temporary audio file");
        }

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    Transcript::failed(UNRECOGNIZED_SPEECH_WARNING)
                } else {
                    Transcript::heard(text)
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "speech recognition failed");
                Transcript::failed(format!("Speech recognition error: {e}"))
            }
        }
    }
}

fn write_temp_audio(audio: &[u8], extension: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("advisor-")
        .suffix(&format!(".{extension}"))
        .tempfile()?;
    file.write_all(audio)?;
    file.flush()?;
    Ok(file)
}
