//! Normalization to the speech profile: 16 kHz, mono, 16-bit PCM WAV

use super::container::{DecodedAudio, decode_container};
use crate::{Error, Result};

/// Sample rate expected by the speech engines
pub const TARGET_SAMPLE_RATE: u32 = 16000;

const RESAMPLE_CHUNK: usize = 1024;

/// Decode any supported container and re-encode it as 16 kHz mono WAV
///
/// # Errors
///
/// Returns error if decoding, resampling or encoding fails
pub fn normalize_to_wav(data: &[u8]) -> Result<Vec<u8>> {
    let decoded = decode_container(data)?;
    let source_rate = decoded.sample_rate;
    let mono = downmix(&decoded);

    let resampled = if source_rate == TARGET_SAMPLE_RATE {
        mono
    } else {
        resample(&mono, source_rate, TARGET_SAMPLE_RATE)?
    };

    tracing::debug!(
        source_rate,
        source_channels = decoded.channels,
        samples = resampled.len(),
        "normalized audio"
    );

    encode_speech_wav(&resampled, TARGET_SAMPLE_RATE)
}

/// Average interleaved channels into one
fn downmix(audio: &DecodedAudio) -> Vec<f32> {
    let channels = usize::from(audio.channels.max(1));
    if channels == 1 {
        return audio.samples.clone();
    }

    #[allow(clippy::cast_precision_loss)]
    let divisor = channels as f32;
    audio
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / divisor)
        .collect()
}

/// Resample mono audio using rubato
///
/// The trailing partial chunk is zero-padded rather than dropped so short
/// utterances keep their last syllable.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate.max(1) as usize);

    let mut chunks = input.chunks_exact(RESAMPLE_CHUNK);
    for chunk in chunks.by_ref() {
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let result = resampler
            .process_partial(Some(&[rest]), None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}

/// Quantize one sample in [-1.0, 1.0] to signed 16-bit PCM; NaN becomes silence
#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample * f32::from(i16::MAX)).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Encode mono samples as a 16-bit PCM WAV at `sample_rate`
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn encode_speech_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(format!("WAV encode failed: {e}"));

    let mut buffer = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut buffer, spec).map_err(wav_err)?;
    samples
        .iter()
        .try_for_each(|&s| writer.write_sample(to_pcm16(s)))
        .map_err(wav_err)?;
    writer.finalize().map_err(wav_err)?;

    Ok(buffer.into_inner())
}
