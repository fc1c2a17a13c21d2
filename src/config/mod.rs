//! Configuration management for the advisor services
//!
//! Every value resolves env > TOML file > default. Environment variables are
//! read once at process start.

pub mod file;

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use crate::llm::{AzureOpenAi, DEFAULT_API_VERSION};
use crate::telephony::{DialogueScript, TwilioClient};
use crate::voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech};
use crate::{Error, Result};
use file::AdvisorConfigFile;

/// Default chat API port
pub const DEFAULT_CHAT_PORT: u16 = 8501;

/// Default telephony webhook port
pub const DEFAULT_TELEPHONY_PORT: u16 = 5000;

/// Advisor configuration
#[derive(Clone)]
pub struct Config {
    /// Path to data directory (catalog database)
    pub data_dir: PathBuf,

    /// Store name used in the call greeting
    pub store_name: String,

    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub api_keys: ApiKeys,
    pub telephony: TelephonyConfig,
    pub server: ServerConfig,
}

/// Product catalog location
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Hosted model configuration
#[derive(Clone, Default)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
    pub api_key: Option<String>,
}

/// Speech engine configuration
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    /// Enable microphone input and spoken replies
    pub enabled: bool,

    /// STT provider: "whisper" or "deepgram"
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// Spoken language hint passed to the recognizer
    pub stt_language: Option<String>,

    /// TTS provider: "openai" or "elevenlabs"
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

/// API keys for the speech engines
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT, TTS)
    pub openai: Option<String>,

    /// Deepgram API key (optional STT)
    pub deepgram: Option<String>,

    /// ElevenLabs API key (optional TTS)
    pub elevenlabs: Option<String>,
}

/// Telephony provider and call script configuration
#[derive(Clone)]
pub struct TelephonyConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Caller ID for outbound calls
    pub from_number: Option<String>,
    /// Default callee for outbound calls
    pub to_number: Option<String>,
    /// Externally reachable base URL, without trailing slash
    pub public_url: String,
    pub port: u16,
    pub voice: String,
    pub language: String,
    pub gather_timeout: u32,
    pub max_reprompts: u32,
    pub readback_limit: usize,
}

/// Chat HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Requests per minute allowed on the chat API
    pub rate_limit_rpm: Option<u32>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a numeric environment variable cannot be parsed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from("."),
            |d| d.data_dir().join("cosmetics-advisor"),
        );
        Self::resolve(fc, data_dir, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric environment variable cannot be parsed
    pub fn resolve(
        fc: AdvisorConfigFile,
        data_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseConfig {
            path: env("ADVISOR_DB_PATH")
                .or(fc.database.path)
                .map_or_else(|| data_dir.join("cosmetics.db"), PathBuf::from),
        };

        let llm = LlmConfig {
            endpoint: env("AZURE_OPENAI_ENDPOINT").or(fc.llm.endpoint),
            deployment: env("AZURE_OPENAI_DEPLOYMENT").or(fc.llm.deployment),
            api_version: env("AZURE_OPENAI_API_VERSION")
                .or(fc.llm.api_version)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_key: env("AZURE_OPENAI_KEY").or(fc.api_keys.azure_openai),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let voice = VoiceConfig {
            enabled: parse_env(&env, "ADVISOR_VOICE_ENABLED")?
                .or(fc.voice.enabled)
                .unwrap_or(true),
            stt_provider: env("ADVISOR_STT_PROVIDER").or(fc.voice.stt_provider),
            stt_model: env("ADVISOR_STT_MODEL").or(fc.voice.stt_model),
            stt_language: env("ADVISOR_STT_LANGUAGE").or(fc.voice.stt_language),
            tts_provider: env("ADVISOR_TTS_PROVIDER").or(fc.voice.tts_provider),
            tts_model: env("ADVISOR_TTS_MODEL").or(fc.voice.tts_model),
            tts_voice: env("ADVISOR_TTS_VOICE").or(fc.voice.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
        };

        let telephony = TelephonyConfig {
            account_sid: env("TWILIO_ACCOUNT_SID").or(fc.telephony.account_sid),
            auth_token: env("TWILIO_AUTH_TOKEN").or(fc.telephony.auth_token),
            from_number: env("TWILIO_PHONE_NUMBER").or(fc.telephony.phone_number),
            to_number: env("USER_PHONE_NUMBER").or(fc.telephony.user_phone_number),
            port: parse_env(&env, "ADVISOR_TELEPHONY_PORT")?
                .or(fc.telephony.port)
                .unwrap_or(DEFAULT_TELEPHONY_PORT),
            public_url: String::new(),
            voice: fc.telephony.voice.unwrap_or_else(|| "alice".to_string()),
            language: fc.telephony.language.unwrap_or_else(|| "en-IN".to_string()),
            gather_timeout: fc.telephony.gather_timeout.unwrap_or(5),
            max_reprompts: parse_env(&env, "ADVISOR_MAX_REPROMPTS")?
                .or(fc.telephony.max_reprompts)
                .unwrap_or(3),
            readback_limit: parse_env(&env, "ADVISOR_READBACK_LIMIT")?
                .or(fc.telephony.readback_limit)
                .unwrap_or(5),
        };
        let public_url = env("ADVISOR_PUBLIC_URL")
            .or(fc.telephony.public_url)
            .unwrap_or_else(|| format!("http://localhost:{}", telephony.port));
        let telephony = TelephonyConfig {
            public_url: public_url.trim_end_matches('/').to_string(),
            ..telephony
        };

        let server = ServerConfig {
            port: parse_env(&env, "ADVISOR_CHAT_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_CHAT_PORT),
            static_dir: env("ADVISOR_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            rate_limit_rpm: parse_env(&env, "ADVISOR_RATE_LIMIT_RPM")?.or(fc.server.rate_limit_rpm),
        };

        Ok(Self {
            data_dir,
            store_name: env("ADVISOR_STORE_NAME")
                .or(fc.store_name)
                .unwrap_or_else(|| "Cosmetics Advisor".to_string()),
            database,
            llm,
            voice,
            api_keys,
            telephony,
            server,
        })
    }

    /// Build the hosted model client
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint, deployment or key is missing
    pub fn llm_client(&self) -> Result<AzureOpenAi> {
        let endpoint = self
            .llm
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::Config("AZURE_OPENAI_ENDPOINT is required".to_string()))?;
        AzureOpenAi::new(
            endpoint,
            self.llm.deployment.as_deref().unwrap_or_default(),
            &self.llm.api_version,
            SecretString::from(self.llm.api_key.clone().unwrap_or_default()),
        )
    }

    /// Build the speech recognizer, if voice is enabled and a key is present
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly requested provider has no key or the
    /// provider name is unknown
    pub fn speech_recognizer(&self) -> Result<Option<Arc<dyn SpeechRecognizer>>> {
        if !self.voice.enabled {
            return Ok(None);
        }

        let provider = match self.voice.stt_provider.as_deref() {
            Some(p) => p.to_lowercase(),
            None if self.api_keys.openai.is_some() => "whisper".to_string(),
            None if self.api_keys.deepgram.is_some() => "deepgram".to_string(),
            None => return Ok(None),
        };

        let stt = match provider.as_str() {
            "whisper" | "openai" => SpeechToText::new_whisper(
                secret(self.api_keys.openai.as_ref()),
                self.voice.stt_model.clone().unwrap_or_else(|| "whisper-1".to_string()),
            )?,
            "deepgram" => SpeechToText::new_deepgram(
                secret(self.api_keys.deepgram.as_ref()),
                self.voice.stt_model.clone().unwrap_or_else(|| "nova-2".to_string()),
            )?,
            other => return Err(Error::Config(format!("unknown STT provider: {other}"))),
        };
        let stt = match &self.voice.stt_language {
            Some(language) => stt.with_language(language.clone()),
            None => stt,
        };

        tracing::info!(provider = ?stt.provider(), "speech recognition enabled");
        Ok(Some(Arc::new(stt)))
    }

    /// Build the speech synthesizer, if voice is enabled and a key is present
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly requested provider has no key or the
    /// provider name is unknown
    pub fn speech_synthesizer(&self) -> Result<Option<Arc<dyn SpeechSynthesizer>>> {
        if !self.voice.enabled {
            return Ok(None);
        }

        let provider = match self.voice.tts_provider.as_deref() {
            Some(p) => p.to_lowercase(),
            None if self.api_keys.openai.is_some() => "openai".to_string(),
            None if self.api_keys.elevenlabs.is_some() => "elevenlabs".to_string(),
            None => return Ok(None),
        };

        let tts = match provider.as_str() {
            "openai" => TextToSpeech::new_openai(
                secret(self.api_keys.openai.as_ref()),
                self.voice.tts_model.clone().unwrap_or_else(|| "tts-1".to_string()),
                self.voice.tts_voice.clone().unwrap_or_else(|| "alloy".to_string()),
                self.voice.tts_speed,
            )?,
            "elevenlabs" => TextToSpeech::new_elevenlabs(
                secret(self.api_keys.elevenlabs.as_ref()),
                self.voice
                    .tts_model
                    .clone()
                    .unwrap_or_else(|| "eleven_multilingual_v2".to_string()),
                self.voice
                    .tts_voice
                    .clone()
                    .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string()),
            )?,
            other => return Err(Error::Config(format!("unknown TTS provider: {other}"))),
        };

        tracing::info!(provider = ?tts.provider(), "speech synthesis enabled");
        Ok(Some(Arc::new(tts)))
    }

    /// Build the outbound call client
    ///
    /// # Errors
    ///
    /// Returns error if telephony credentials are missing
    pub fn twilio_client(&self) -> Result<TwilioClient> {
        TwilioClient::new(
            self.telephony.account_sid.clone().unwrap_or_default(),
            secret(self.telephony.auth_token.as_ref()),
            self.telephony.from_number.clone().unwrap_or_default(),
        )
    }

    /// Call script built from the telephony settings
    #[must_use]
    pub fn dialogue_script(&self) -> DialogueScript {
        DialogueScript {
            store_name: self.store_name.clone(),
            voice: self.telephony.voice.clone(),
            language: self.telephony.language.clone(),
            process_url: self.telephony.url("process"),
            gather_timeout: self.telephony.gather_timeout,
            max_reprompts: self.telephony.max_reprompts,
            readback_limit: self.telephony.readback_limit,
        }
    }
}

impl TelephonyConfig {
    /// Absolute URL of a telephony route
    #[must_use]
    pub fn url(&self, route: &str) -> String {
        format!("{}/{}", self.public_url, route.trim_start_matches('/'))
    }
}

fn secret(value: Option<&String>) -> SecretString {
    SecretString::from(value.cloned().unwrap_or_default())
}

fn parse_env<T: std::str::FromStr>(
    env: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {key}: {v}")))
        })
        .transpose()
}
