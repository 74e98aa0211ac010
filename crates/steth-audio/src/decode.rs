use std::path::Path;

use anyhow::{Context, Result};
use steth_core::PIPELINE_SAMPLE_RATE;
use steth_core::error::PipelineError;
use steth_core::frame::SampleBuffer;

use crate::resample::resample_buffer;

/// Minimum size of a canonical RIFF/WAVE header.
const MIN_HEADER_LEN: usize = 44;
/// First chunk header after "RIFF" <size> "WAVE".
const FIRST_CHUNK_OFFSET: usize = 12;
const PCM_FORMAT: u16 = 1;

/// Header fields read at their canonical byte offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    /// Bytes 20–21. 1 = integer PCM.
    pub format_code: u16,
    /// Bytes 22–23.
    pub channels: u16,
    /// Bytes 24–27.
    pub sample_rate: u32,
    /// Bytes 34–35.
    pub bits_per_sample: u16,
}

impl WavHeader {
    /// Parse the fixed-offset header fields.
    ///
    /// # Errors
    /// `InvalidContainer` when fewer than 44 bytes are available or a field is zero.
    pub fn parse(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(PipelineError::InvalidContainer(format!(
                "{} octets, en-tête minimal de {MIN_HEADER_LEN}",
                bytes.len()
            )));
        }

        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            log::warn!("Missing RIFF/WAVE magic, decoding by fixed offsets anyway");
        }

        let header = Self {
            format_code: read_u16(bytes, 20),
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
        };

        if header.channels == 0 {
            return Err(PipelineError::InvalidContainer("0 canal déclaré".into()));
        }
        if header.sample_rate == 0 {
            return Err(PipelineError::InvalidContainer("sample rate nul".into()));
        }
        Ok(header)
    }
}

/// Decode an uncompressed RIFF/WAVE byte buffer into a mono buffer at its native rate.
///
/// 16- and 24-bit signed little-endian PCM are supported; multi-channel frames are
/// averaged before scaling by the full-scale divisor (32768 / 8388608). A non-PCM
/// format code is tolerated with a warning.
///
/// # Errors
/// `InvalidContainer` for a short/unparseable header, `UnsupportedFormat` for any
/// other bit depth.
///
/// # Example
/// ```
/// use steth_audio::decode::decode_wav;
/// # fn wav(rate: u32, samples: &[i16]) -> Vec<u8> {
/// #     let data_len = (samples.len() * 2) as u32;
/// #     let mut b = Vec::new();
/// #     b.extend_from_slice(b"RIFF"); b.extend_from_slice(&(36 + data_len).to_le_bytes());
/// #     b.extend_from_slice(b"WAVEfmt "); b.extend_from_slice(&16u32.to_le_bytes());
/// #     b.extend_from_slice(&1u16.to_le_bytes()); b.extend_from_slice(&1u16.to_le_bytes());
/// #     b.extend_from_slice(&rate.to_le_bytes()); b.extend_from_slice(&(rate * 2).to_le_bytes());
/// #     b.extend_from_slice(&2u16.to_le_bytes()); b.extend_from_slice(&16u16.to_le_bytes());
/// #     b.extend_from_slice(b"data"); b.extend_from_slice(&data_len.to_le_bytes());
/// #     for s in samples { b.extend_from_slice(&s.to_le_bytes()); }
/// #     b
/// # }
/// let bytes = wav(16_000, &[16_384, -32_768]);
/// let buf = decode_wav(&bytes).unwrap();
/// assert_eq!(buf.samples(), &[0.5, -1.0]);
/// assert_eq!(buf.sample_rate(), 16_000);
/// ```
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, PipelineError> {
    let header = WavHeader::parse(bytes)?;

    if header.format_code != PCM_FORMAT {
        log::warn!(
            "Audio format code {} is not integer PCM, decoding as PCM",
            header.format_code
        );
    }

    let (bytes_per_sample, full_scale) = match header.bits_per_sample {
        16 => (2usize, 32_768.0f32),
        24 => (3usize, 8_388_608.0f32),
        bits => {
            return Err(PipelineError::UnsupportedFormat {
                bits_per_sample: bits,
            });
        }
    };

    let payload = locate_data(bytes);
    let channels = usize::from(header.channels);
    let frame_len = bytes_per_sample * channels;

    let samples: Vec<f32> = payload
        .chunks_exact(frame_len)
        .map(|frame| {
            let sum: i64 = frame
                .chunks_exact(bytes_per_sample)
                .map(|s| i64::from(read_sample(s)))
                .sum();
            (sum as f32 / channels as f32) / full_scale
        })
        .collect();

    log::info!(
        "Decoded {} samples @ {}Hz ({} ch, {} bits)",
        samples.len(),
        header.sample_rate,
        header.channels,
        header.bits_per_sample
    );

    Ok(SampleBuffer::new(samples, header.sample_rate))
}

/// Decode then bring the buffer to the pipeline rate (16 kHz) if needed.
///
/// # Errors
/// Same as [`decode_wav`].
pub fn decode_for_pipeline(bytes: &[u8]) -> Result<SampleBuffer, PipelineError> {
    let buffer = decode_wav(bytes)?;
    if buffer.sample_rate() == PIPELINE_SAMPLE_RATE {
        return Ok(buffer);
    }
    Ok(resample_buffer(&buffer, PIPELINE_SAMPLE_RATE))
}

/// Read a WAV file and decode it at the pipeline rate.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
///
/// # Example
/// ```no_run
/// use steth_audio::decode::decode_file;
/// let buffer = decode_file("lung.wav").unwrap();
/// ```
pub fn decode_file(path: impl AsRef<Path>) -> Result<SampleBuffer> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    decode_for_pipeline(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Payload of the first "data" chunk, scanning 8-byte chunk headers from offset 12.
/// Falls back to everything after byte 44 when no data chunk is found.
fn locate_data(bytes: &[u8]) -> &[u8] {
    let mut offset = FIRST_CHUNK_OFFSET;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32(bytes, offset + 4) as usize;
        let body = offset + 8;
        if id == b"data" {
            let end = body.saturating_add(size).min(bytes.len());
            return &bytes[body..end];
        }
        offset = match body.checked_add(size) {
            Some(next) => next,
            None => break,
        };
    }
    log::warn!("No data chunk found, assuming payload starts at byte {MIN_HEADER_LEN}");
    &bytes[MIN_HEADER_LEN.min(bytes.len())..]
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Signed little-endian PCM sample of 2 or 3 bytes.
fn read_sample(s: &[u8]) -> i32 {
    match s {
        &[lo, hi] => i32::from(i16::from_le_bytes([lo, hi])),
        // Sign-extend 24-bit through the top byte of an i32.
        &[b0, b1, b2] => i32::from_le_bytes([0, b0, b1, b2]) >> 8,
        _ => 0,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Canonical 44-byte-header WAV with interleaved integer samples.
    pub(crate) fn build_wav(rate: u32, channels: u16, bits: u16, frames: &[i32]) -> Vec<u8> {
        let bytes_per_sample = usize::from(bits / 8);
        let data_len = (frames.len() * bytes_per_sample) as u32;
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&(36 + data_len).to_le_bytes());
        b.extend_from_slice(b"WAVEfmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&channels.to_le_bytes());
        b.extend_from_slice(&rate.to_le_bytes());
        let block_align = u32::from(channels) * u32::from(bits / 8);
        b.extend_from_slice(&(rate * block_align).to_le_bytes());
        b.extend_from_slice(&(block_align as u16).to_le_bytes());
        b.extend_from_slice(&bits.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&data_len.to_le_bytes());
        for &s in frames {
            b.extend_from_slice(&s.to_le_bytes()[..bytes_per_sample]);
        }
        b
    }

    #[test]
    fn too_short_is_invalid_container() {
        assert!(matches!(
            decode_wav(&[0u8; 43]),
            Err(PipelineError::InvalidContainer(_))
        ));
    }

    #[test]
    fn mono_16_bit_is_scaled() -> Result<(), PipelineError> {
        let buf = decode_wav(&build_wav(16_000, 1, 16, &[0, 16_384, -16_384, 32_767]))?;
        assert_eq!(buf.len(), 4);
        assert!((buf.samples()[1] - 0.5).abs() < 1e-6);
        assert!((buf.samples()[2] + 0.5).abs() < 1e-6);
        assert!(buf.samples()[3] < 1.0);
        Ok(())
    }

    #[test]
    fn stereo_frames_are_averaged() -> Result<(), PipelineError> {
        let buf = decode_wav(&build_wav(16_000, 2, 16, &[16_384, 0, -32_768, -32_768]))?;
        assert_eq!(buf.len(), 2);
        assert!((buf.samples()[0] - 0.25).abs() < 1e-6);
        assert!((buf.samples()[1] + 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn twenty_four_bit_sign_extension() -> Result<(), PipelineError> {
        let buf = decode_wav(&build_wav(16_000, 1, 24, &[4_194_304, -8_388_608, -1]))?;
        assert!((buf.samples()[0] - 0.5).abs() < 1e-6);
        assert!((buf.samples()[1] + 1.0).abs() < 1e-6);
        assert!(buf.samples()[2] < 0.0);
        Ok(())
    }

    #[test]
    fn eight_bit_is_unsupported() {
        let mut bytes = build_wav(16_000, 1, 16, &[0; 4]);
        bytes[34] = 8;
        assert_eq!(
            decode_wav(&bytes),
            Err(PipelineError::UnsupportedFormat { bits_per_sample: 8 })
        );
    }

    #[test]
    fn non_pcm_format_is_tolerated() -> Result<(), PipelineError> {
        let mut bytes = build_wav(16_000, 1, 16, &[100; 8]);
        bytes[20] = 3;
        assert_eq!(decode_wav(&bytes)?.len(), 8);
        Ok(())
    }

    #[test]
    fn data_chunk_found_after_extra_chunks() -> Result<(), PipelineError> {
        let canonical = build_wav(16_000, 1, 16, &[16_384, 16_384]);
        // Splice a LIST chunk between fmt and data.
        let mut bytes = canonical[..36].to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"INFO");
        bytes.extend_from_slice(&canonical[36..]);

        let buf = decode_wav(&bytes)?;
        assert_eq!(buf.len(), 2);
        assert!((buf.samples()[0] - 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn missing_data_chunk_falls_back_to_offset_44() -> Result<(), PipelineError> {
        let mut bytes = build_wav(16_000, 1, 16, &[16_384, 16_384, 16_384]);
        bytes[36..40].copy_from_slice(b"junk");
        // "junk" claims 6 bytes, so the scan steps past the end.
        let buf = decode_wav(&bytes)?;
        assert_eq!(buf.len(), 3);
        Ok(())
    }

    #[test]
    fn foreign_rate_is_resampled_to_pipeline_rate() -> Result<(), PipelineError> {
        let bytes = build_wav(8_000, 1, 16, &[1_000; 8_000]);
        let buf = decode_for_pipeline(&bytes)?;
        assert_eq!(buf.sample_rate(), PIPELINE_SAMPLE_RATE);
        assert_eq!(buf.len(), 16_000);
        Ok(())
    }

    #[test]
    fn decode_file_reads_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("heart.wav");
        std::fs::write(&path, build_wav(16_000, 1, 16, &[0; 320]))?;
        let buf = decode_file(&path)?;
        assert_eq!(buf.len(), 320);
        Ok(())
    }
}
