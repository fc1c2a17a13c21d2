//! Container sniffing and decoding

use std::io::Cursor;

use crate::{Error, Result};

/// Audio container detected from header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Wav,
    Mp3,
    Ogg,
    WebM,
    Flac,
    Unknown,
}

impl ContainerFormat {
    /// Detect the container from its magic bytes
    #[must_use]
    pub fn sniff(data: &[u8]) -> Self {
        match data {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Self::Wav,
            [b'I', b'D', b'3', ..] => Self::Mp3,
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Self::Mp3,
            [b'O', b'g', b'g', b'S', ..] => Self::Ogg,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Self::WebM,
            [b'f', b'L', b'a', b'C', ..] => Self::Flac,
            _ => Self::Unknown,
        }
    }

    /// Short lowercase name for logs and warnings
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::WebM => "webm",
            Self::Flac => "flac",
            Self::Unknown => "unknown",
        }
    }

    /// File extension a speech engine expects for this container
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::WebM => "webm",
            Self::Flac => "flac",
            Self::Wav | Self::Unknown => "wav",
        }
    }

    /// MIME type for uploads of this container
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::WebM => "audio/webm",
            Self::Flac => "audio/flac",
            Self::Wav | Self::Unknown => "audio/wav",
        }
    }

    /// Map a file extension back to a container, case-insensitively
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "wav" => Self::Wav,
            "mp3" => Self::Mp3,
            "ogg" | "oga" | "opus" => Self::Ogg,
            "webm" => Self::WebM,
            "flac" => Self::Flac,
            _ => Self::Unknown,
        }
    }

    /// Containers with no local decoder that the hosted engines accept as-is
    #[must_use]
    pub const fn is_engine_native(self) -> bool {
        matches!(self, Self::Ogg | Self::WebM | Self::Flac)
    }
}

/// Decoded PCM audio, interleaved, in [-1.0, 1.0]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / f32::from(self.channels) / self.sample_rate as f32
    }
}

/// Decode an encoded audio buffer, auto-detecting the container
///
/// # Errors
///
/// Returns error if the container is unknown, unsupported or corrupt
pub fn decode_container(data: &[u8]) -> Result<DecodedAudio> {
    let format = ContainerFormat::sniff(data);
    tracing::debug!(format = format.name(), bytes = data.len(), "decoding audio container");

    match format {
        ContainerFormat::Wav => decode_wav(data),
        ContainerFormat::Mp3 => decode_mp3(data),
        ContainerFormat::Ogg | ContainerFormat::WebM | ContainerFormat::Flac => Err(Error::Audio(
            format!("{} audio cannot be decoded locally", format.name()),
        )),
        ContainerFormat::Unknown => Err(Error::Audio("unrecognized audio container".to_string())),
    }
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(data)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        (hound::SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = int_scale(bits);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| int_to_f32(v, scale)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
        (format, bits) => {
            return Err(Error::Audio(format!(
                "unsupported WAV sample format {format:?} at {bits} bits"
            )));
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[allow(clippy::cast_precision_loss)]
fn int_scale(bits: u16) -> f32 {
    (1_i64 << (bits - 1)) as f32
}

#[allow(clippy::cast_precision_loss)]
fn int_to_f32(value: i32, scale: f32) -> f32 {
    value as f32 / scale
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn decode_mp3(data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(data);
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0_u32;
    let mut channels = 0_u16;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                channels = frame.channels as u16;
                samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Audio("MP3 stream contained no audio frames".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}
