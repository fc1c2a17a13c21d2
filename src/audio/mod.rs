//! Audio handling for browser microphone captures
//!
//! Turns an opaque microphone payload into encoded audio bytes, decodes the
//! container and normalizes it to the 16 kHz mono 16-bit profile that the
//! speech engines expect.

mod container;
mod normalize;
mod payload;

pub use container::{ContainerFormat, DecodedAudio, decode_container};
pub use normalize::{TARGET_SAMPLE_RATE, encode_speech_wav, normalize_to_wav, resample};
pub use payload::{MicPayload, PayloadError, decode_mic_payload};
