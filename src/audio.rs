//! WAV decoding/encoding, channel mixdown, and resampling shared by the
//! pipeline, the engines, and the facade.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::interface::RawAudio;

/// Interleaved multi-channel to mono by frame averaging.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Decode a WAV file from disk.
pub fn read_wav(path: &Path) -> Result<RawAudio> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open wav {}", path.display()))?;
    decode_reader(reader)
}

/// Decode a WAV held in memory (e.g. an HTTP response body).
pub fn decode_wav(bytes: &[u8]) -> Result<RawAudio> {
    let reader = WavReader::new(Cursor::new(bytes)).context("invalid wav payload")?;
    decode_reader(reader)
}

fn decode_reader<R: std::io::Read>(mut reader: WavReader<R>) -> Result<RawAudio> {
    let spec = reader.spec();
    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) | (SampleFormat::Int, 32) => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => bail!("unsupported wav format: {bits}-bit {format:?}"),
    };
    Ok(RawAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Write mono samples as a 32-bit float WAV.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav {}", path.display()))?;
    for s in samples {
        writer.write_sample(*s)?;
    }
    writer.finalize().context("failed to finalize wav")?;
    Ok(())
}

/// Resample mono samples by `ratio` (output length ≈ input length × ratio)
/// using Sinc interpolation with chunked processing. The final chunk is
/// zero-padded and the output truncated back to the expected length.
pub fn resample(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if samples.is_empty() || (ratio - 1.0).abs() < 1e-9 {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 16.0, params, 1024, 1)
        .context("failed to create resampler")?;

    let chunk = resampler.input_frames_max();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut out = Vec::with_capacity(expected + chunk);

    let mut idx = 0;
    while idx < samples.len() {
        let end = (idx + chunk).min(samples.len());
        let mut block = samples[idx..end].to_vec();
        block.resize(chunk, 0.0);
        let processed = resampler
            .process(&[block], None)
            .context("resampling failed")?;
        out.extend_from_slice(&processed[0]);
        idx += chunk;
    }

    out.truncate(expected);
    Ok(out)
}
