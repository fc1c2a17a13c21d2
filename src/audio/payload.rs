//! Microphone payload decoding
//!
//! A browser recorder widget can hand back its capture in several shapes.
//! The payload is first classified into exactly one [`MicPayload`] variant,
//! then decoded. Both steps are total: every failure is a [`PayloadError`].

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;

/// Keys probed, in order, when the payload is a mapping
pub const WRAPPED_KEYS: [&str; 3] = ["bytes", "audio", "blob"];

const DATA_URL_SCHEME: &str = "data:";

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Why a payload produced no audio
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Nothing was captured
    #[error("empty payload")]
    Empty,

    /// The value is none of the known shapes
    #[error("unrecognized payload shape: {0}")]
    UnrecognizedShape(&'static str),

    /// A data URL without a comma separating header and data
    #[error("malformed data URL")]
    MalformedDataUrl,

    /// The string is not valid base64
    #[error("invalid base64")]
    InvalidBase64,

    /// A mapping where none of the candidate keys held decodable audio
    #[error("no decodable audio under keys bytes/audio/blob")]
    NoAudioKey,
}

/// Classified microphone payload
#[derive(Debug, Clone, PartialEq)]
pub enum MicPayload {
    /// Raw encoded audio bytes
    RawBytes(Vec<u8>),
    /// Plain base64 string
    Base64(String),
    /// `data:<mime>;base64,<data>` string
    DataUrl(String),
    /// Mapping with candidate values, in probe order
    Wrapped(Vec<MicPayload>),
}

impl MicPayload {
    /// Classify a string value
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        if text.starts_with(DATA_URL_SCHEME) {
            Self::DataUrl(text.to_string())
        } else {
            Self::Base64(text.to_string())
        }
    }

    /// Classify a JSON value into one payload shape
    ///
    /// Arrays of integers 0..=255 are raw bytes, strings are base64 or data
    /// URLs, and objects are probed for `bytes`, `audio` and `blob` in order.
    ///
    /// # Errors
    ///
    /// Returns error if the value matches none of the shapes
    pub fn classify(value: &Value) -> Result<Self, PayloadError> {
        match value {
            Value::Null => Err(PayloadError::Empty),
            Value::String(s) if s.trim().is_empty() => Err(PayloadError::Empty),
            Value::String(s) => Ok(Self::from_text(s)),
            Value::Array(items) => byte_array(items).map(Self::RawBytes),
            Value::Object(map) => {
                let candidates: Vec<Self> = WRAPPED_KEYS
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .filter(|v| !is_empty_value(v))
                    .filter_map(|v| match v {
                        // nested mappings are not a recorder shape
                        Value::Object(_) => None,
                        other => Self::classify(other).ok(),
                    })
                    .collect();

                if candidates.is_empty() {
                    Err(PayloadError::NoAudioKey)
                } else {
                    Ok(Self::Wrapped(candidates))
                }
            }
            Value::Bool(_) => Err(PayloadError::UnrecognizedShape("boolean")),
            Value::Number(_) => Err(PayloadError::UnrecognizedShape("number")),
        }
    }

    /// Decode the payload into encoded audio bytes
    ///
    /// For wrapped payloads the first candidate that decodes wins.
    ///
    /// # Errors
    ///
    /// Returns error if no audio bytes can be recovered
    pub fn into_bytes(self) -> Result<Vec<u8>, PayloadError> {
        let bytes = match self {
            Self::RawBytes(bytes) => bytes,
            Self::Base64(text) => decode_base64(&text)?,
            Self::DataUrl(text) => {
                let (_, data) = text.split_once(',').ok_or(PayloadError::MalformedDataUrl)?;
                decode_base64(data)?
            }
            Self::Wrapped(candidates) => {
                return candidates
                    .into_iter()
                    .find_map(|candidate| candidate.into_bytes().ok())
                    .ok_or(PayloadError::NoAudioKey);
            }
        };

        if bytes.is_empty() {
            Err(PayloadError::Empty)
        } else {
            Ok(bytes)
        }
    }
}

/// Decode a microphone payload, collapsing every failure to `None`
#[must_use]
pub fn decode_mic_payload(value: &Value) -> Option<Vec<u8>> {
    match MicPayload::classify(value).and_then(MicPayload::into_bytes) {
        Ok(bytes) => {
            tracing::debug!(bytes = bytes.len(), "decoded microphone payload");
            Some(bytes)
        }
        Err(e) => {
            tracing::debug!(error = %e, "microphone payload yielded no audio");
            None
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(_) => false,
    }
}

fn byte_array(items: &[Value]) -> Result<Vec<u8>, PayloadError> {
    if items.is_empty() {
        return Err(PayloadError::Empty);
    }
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or(PayloadError::UnrecognizedShape("array of non-byte values"))
        })
        .collect()
}

fn decode_base64(text: &str) -> Result<Vec<u8>, PayloadError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(PayloadError::Empty);
    }

    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
        .map_err(|_| PayloadError::InvalidBase64)
}
