//! Persisting turn audio.
//!
//! Live backends return raw little-endian 16-bit mono PCM.  Wrapping it in
//! a WAV header makes it playable by ordinary tools.

use std::path::Path;
use std::time::Duration;

use ta_domain::error::{Error, Result};

const BYTES_PER_SAMPLE: usize = 2;

/// Write `pcm` (s16le mono) to `path` as a WAV file.
///
/// A trailing odd byte cannot form a sample and is dropped.
pub fn write_wav(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(Error::Audio("sample rate must be positive".into()));
    }
    let usable = pcm.len() - pcm.len() % BYTES_PER_SAMPLE;
    if usable != pcm.len() {
        tracing::warn!(len = pcm.len(), "audio ends with a partial sample, dropping last byte");
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for chunk in pcm[..usable].chunks_exact(BYTES_PER_SAMPLE) {
        writer
            .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
            .map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    tracing::debug!(
        path = %path.display(),
        samples = usable / BYTES_PER_SAMPLE,
        sample_rate,
        "wrote wav"
    );
    Ok(())
}

/// Playback length of `len` bytes of s16le mono PCM at `sample_rate`.
pub fn pcm_duration(len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let samples = (len / BYTES_PER_SAMPLE) as u64;
    Duration::from_micros(samples * 1_000_000 / u64::from(sample_rate))
}

fn wav_err(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::Audio(other.to_string()),
    }
}
