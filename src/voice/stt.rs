//! Speech-to-text (STT) engines

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::audio::ContainerFormat;
use crate::{Error, Result};

/// A speech recognition engine
///
/// Engines receive either a normalized 16 kHz mono WAV or an Ogg, WebM or
/// FLAC capture as recorded; the file extension names the container. An
/// utterance the engine could not make sense of is `Ok` with an empty
/// string; `Err` is reserved for request-level failures.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in the audio file at `audio_path`
    async fn recognize(&self, audio_path: &Path) -> Result<String>;
}

/// Container of an upload, from its file extension (WAV when unknown)
fn upload_format(audio_path: &Path) -> ContainerFormat {
    match audio_path
        .extension()
        .and_then(|e| e.to_str())
        .map(ContainerFormat::from_extension)
    {
        Some(ContainerFormat::Unknown) | None => ContainerFormat::Wav,
        Some(format) => format,
    }
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

/// Hosted speech-to-text client
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: Option<String>,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Whisper, api_key, model)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Deepgram, api_key, model)
    }

    fn new(provider: SttProvider, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for STT")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language: None,
            provider,
        })
    }

    /// Hint the spoken language (ISO 639-1, e.g. "en")
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Provider backing this client
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: Vec<u8>, format: ContainerFormat) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), format = format.name(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(format!("speech.{}", format.extension()))
                    .mime_str(format.mime_type())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Whisper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid Whisper response: {e}")))?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>, format: ContainerFormat) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), format = format.name(), "starting Deepgram transcription");

        let mut url = url::Url::parse("https://api.deepgram.com/v1/listen")
            .map_err(|e| Error::Stt(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("punctuate", "true");
        if let Some(language) = &self.language {
            url.query_pairs_mut().append_pair("language", language);
        }

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", format.mime_type())
            .body(audio)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Deepgram request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid Deepgram response: {e}")))?;

        Ok(result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn recognize(&self, audio_path: &Path) -> Result<String> {
        let audio = tokio::fs::read(audio_path).await?;
        let format = upload_format(audio_path);

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio, format).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio, format).await?,
        };

        tracing::info!(provider = ?self.provider, transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let err = SpeechToText::new_whisper(SecretString::from(String::new()), "whisper-1".to_string());
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_provider_selection() {
        let stt = SpeechToText::new_deepgram(SecretString::from("key".to_string()), "nova-2".to_string())
            .unwrap()
            .with_language("en");
        assert_eq!(stt.provider(), SttProvider::Deepgram);
        assert_eq!(stt.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_upload_format_follows_extension() {
        assert_eq!(upload_format(Path::new("/tmp/advisor-x.webm")), ContainerFormat::WebM);
        assert_eq!(upload_format(Path::new("/tmp/advisor-x.OGG")), ContainerFormat::Ogg);
        assert_eq!(upload_format(Path::new("/tmp/advisor-x.flac")), ContainerFormat::Flac);
        assert_eq!(upload_format(Path::new("/tmp/advisor-x.wav")), ContainerFormat::Wav);
        assert_eq!(upload_format(Path::new("/tmp/advisor-x")), ContainerFormat::Wav);
        assert_eq!(upload_format(Path::new("/tmp/advisor-x.tmp")), ContainerFormat::Wav);
    }

    #[test]
    fn test_deepgram_response_shape() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"red lipstick"}]}]}}"#;
        let parsed: DeepgramResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.channels[0].alternatives[0].transcript, "red lipstick");
    }
}
