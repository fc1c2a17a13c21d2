//! TOML configuration file loading
//!
//! Supports `~/.config/cosmetics-advisor/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults and is itself overridden by environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdvisorConfigFile {
    /// Store name used in the call greeting
    pub store_name: Option<String>,

    pub database: DatabaseFileConfig,
    pub llm: LlmFileConfig,
    pub voice: VoiceFileConfig,
    pub api_keys: ApiKeysFileConfig,
    pub telephony: TelephonyFileConfig,
    pub server: ServerFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    /// Path to the SQLite product catalog
    pub path: Option<String>,
}

/// Hosted model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Azure OpenAI resource endpoint
    pub endpoint: Option<String>,
    /// Deployment name
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

/// Speech engine configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone input and spoken replies
    pub enabled: Option<bool>,
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,
    /// Spoken language hint (e.g. "en")
    pub stt_language: Option<String>,
    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,
    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,
    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,
    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
}

/// API keys for external services
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub azure_openai: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Telephony provider and call script configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelephonyFileConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Caller ID for outbound calls
    pub phone_number: Option<String>,
    /// Default callee for outbound calls
    pub user_phone_number: Option<String>,
    /// Externally reachable base URL of the telephony service
    pub public_url: Option<String>,
    pub port: Option<u16>,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub gather_timeout: Option<u32>,
    pub max_reprompts: Option<u32>,
    pub readback_limit: Option<usize>,
}

/// Chat server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Chat API port
    pub port: Option<u16>,
    /// Static web UI directory
    pub static_dir: Option<String>,
    /// Requests per minute allowed on the chat API
    pub rate_limit_rpm: Option<u32>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<AdvisorConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `AdvisorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AdvisorConfigFile {
    config_file_path().map_or_else(AdvisorConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> AdvisorConfigFile {
    if !path.exists() {
        return AdvisorConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AdvisorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AdvisorConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/cosmetics-advisor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cosmetics-advisor").join("config.toml"))
}
