//! Log-mel feature extraction matching the classifier's training front end.
//!
//! Fixed pipeline, no configuration: 1 s at 16 kHz, 400-point Hann frames with a
//! 160-sample hop, 64 L1-normalised triangular mel filters, dB relative to the
//! global maximum with an 80 dB floor, then truncation/padding to 256 frames.

use ndarray::Array2;
use steth_core::error::PipelineError;
use steth_core::frame::{MelTensor, SampleBuffer};
use steth_core::{MAX_FRAMES, N_MELS, PIPELINE_SAMPLE_RATE};

use crate::fft::FftPipeline;
use crate::resample::resample;
use crate::signal::fit_length;

/// FFT / window length (25 ms).
pub const N_FFT: usize = 400;
/// Frame hop (10 ms).
pub const HOP_LENGTH: usize = 160;
/// Energy floor applied after the filterbank.
pub const ENERGY_FLOOR: f32 = 1e-10;
/// Dynamic range kept below the global maximum.
pub const TOP_DB: f32 = 80.0;

/// Convert frequency to mel scale
#[must_use]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel scale to frequency
#[must_use]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Build `n_mels` triangular filters from 0 Hz to Nyquist, each row L1-normalised.
///
/// Break points are `n_mels + 2` mel-spaced frequencies mapped to FFT bins with
/// `floor((n_fft + 1) × hz / sample_rate)`; filter `m` rises over
/// `[bin[m], bin[m+1])` and falls over `[bin[m+1], bin[m+2])`. A row stays
/// all-zero when it has neither a falling edge nor a rising edge two bins wide.
/// At 64 mels, 400-point FFT and 16 kHz only row 2 (break bins 1, 2, 2) is empty.
///
/// # Example
/// ```
/// use steth_audio::mel::mel_filterbank;
/// let bank = mel_filterbank(64, 400, 16_000);
/// assert_eq!(bank.dim(), (64, 201));
/// let row: f32 = bank.row(40).sum();
/// assert!((row - 1.0).abs() < 1e-5);
/// ```
#[must_use]
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let mel_max = hz_to_mel(sample_rate as f32 / 2.0);

    let bins: Vec<usize> = (0..n_mels + 2)
        .map(|i| {
            let mel = mel_max * i as f32 / (n_mels + 1) as f32;
            let bin = ((n_fft + 1) as f32 * mel_to_hz(mel) / sample_rate as f32).floor();
            (bin.max(0.0) as usize).min(n_bins - 1)
        })
        .collect();

    let mut bank = Array2::<f32>::zeros((n_mels, n_bins));
    for (m, mut row) in bank.rows_mut().into_iter().enumerate() {
        let (left, center, right) = (bins[m], bins[m + 1], bins[m + 2]);

        for k in left..center {
            row[k] = (k - left) as f32 / (center - left) as f32;
        }
        for k in center..right {
            row[k] = (right - k) as f32 / (right - center) as f32;
        }

        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|w| w / sum);
        }
    }
    bank
}

/// Edge-reflect `pad` samples onto both ends (the edge sample itself is not repeated).
///
/// # Example
/// ```
/// use steth_audio::mel::reflect_pad;
/// assert_eq!(reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2), vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
/// ```
#[must_use]
pub fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return vec![0.0; 2 * pad];
    }
    let mut out = Vec::with_capacity(n + 2 * pad);
    // Left: signal[pad], ..., signal[1]
    for i in (0..pad).rev() {
        out.push(signal[reflect_index(i + 1, n)]);
    }
    out.extend_from_slice(signal);
    // Right: signal[n-2], signal[n-3], ...
    for i in 0..pad {
        out.push(signal[reflect_index(n + i, n)]);
    }
    out
}

/// Fold an index back into `0..n` by repeated edge reflection.
fn reflect_index(i: usize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let r = i % period;
    if r < n { r } else { period - r }
}

/// Fixed log-mel feature extractor.
///
/// Owns the FFT plan and the filterbank; `extract` can be called repeatedly.
///
/// # Example
/// ```
/// use steth_audio::mel::MelExtractor;
/// use steth_core::frame::SampleBuffer;
/// let mut extractor = MelExtractor::new();
/// let tensor = extractor.extract(&SampleBuffer::new(vec![0.1; 8_000], 16_000)).unwrap();
/// assert_eq!(tensor.shape(), (64, 256));
/// ```
pub struct MelExtractor {
    fft: FftPipeline,
    filterbank: Array2<f32>,
}

impl Default for MelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MelExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fft: FftPipeline::new(N_FFT),
            filterbank: mel_filterbank(N_MELS, N_FFT, PIPELINE_SAMPLE_RATE),
        }
    }

    /// Turn a mono buffer into a normalised `64 × 256` log-mel tensor.
    ///
    /// Buffers at another rate are resampled to 16 kHz first.
    ///
    /// # Errors
    /// `EmptySignal` for a zero-length buffer.
    pub fn extract(&mut self, buffer: &SampleBuffer) -> Result<MelTensor, PipelineError> {
        if buffer.is_empty() {
            return Err(PipelineError::EmptySignal);
        }

        let at_rate = resample(buffer.samples(), buffer.sample_rate(), PIPELINE_SAMPLE_RATE);
        if buffer.sample_rate() != PIPELINE_SAMPLE_RATE {
            log::debug!(
                "Feature extraction resampled {}Hz -> {PIPELINE_SAMPLE_RATE}Hz",
                buffer.sample_rate()
            );
        }

        // 1. Exactly one second.
        let signal = fit_length(&at_rate, PIPELINE_SAMPLE_RATE as usize);

        // 2–4. Centered frames → power spectrum → mel energies.
        let mel = self.mel_energies(&signal);

        // 5. dB relative to the global maximum, 80 dB floor.
        let db = power_to_db(&mel);

        // 6. Fixed number of frames.
        let fixed = fix_frames(&db);

        // 7. Range normalisation.
        let normalized = normalize_range(fixed);

        MelTensor::from_array(normalized)
            .ok_or_else(|| PipelineError::Model("tenseur mel de forme inattendue".into()))
    }

    /// Mel energies `[n_mels, n_frames]`, floored at `ENERGY_FLOOR`.
    fn mel_energies(&mut self, signal: &[f32]) -> Array2<f32> {
        let padded = reflect_pad(signal, N_FFT / 2);
        let n_frames = 1 + (padded.len() - N_FFT) / HOP_LENGTH;
        let mut mel = Array2::<f32>::zeros((N_MELS, n_frames));

        for t in 0..n_frames {
            let start = t * HOP_LENGTH;
            let power = self.fft.power_spectrum(&padded[start..start + N_FFT]);
            for (m, filter) in self.filterbank.rows().into_iter().enumerate() {
                let energy: f32 = filter.iter().zip(power).map(|(w, p)| w * p).sum();
                mel[[m, t]] = energy.max(ENERGY_FLOOR);
            }
        }
        mel
    }
}

/// One-shot convenience around [`MelExtractor`].
///
/// # Errors
/// `EmptySignal` for a zero-length buffer.
pub fn extract_features(buffer: &SampleBuffer) -> Result<MelTensor, PipelineError> {
    MelExtractor::new().extract(buffer)
}

/// `10·log10(value / global_max)`, clipped below at `-TOP_DB`.
#[must_use]
pub fn power_to_db(mel: &Array2<f32>) -> Array2<f32> {
    let reference = mel.iter().copied().fold(ENERGY_FLOOR, f32::max);
    mel.mapv(|v| (10.0 * (v / reference).log10()).max(-TOP_DB))
}

/// Keep the first `MAX_FRAMES` columns, right-padding rows with `-TOP_DB`.
#[must_use]
pub fn fix_frames(db: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = db.dim();
    let mut out = Array2::from_elem((rows, MAX_FRAMES), -TOP_DB);
    let keep = cols.min(MAX_FRAMES);
    out.slice_mut(ndarray::s![.., ..keep])
        .assign(&db.slice(ndarray::s![.., ..keep]));
    out
}

/// Divide by the global maximum when it is strictly positive; grids whose
/// maximum is ≤ 0 (always the case after `power_to_db`) pass through untouched.
#[must_use]
pub fn normalize_range(mut grid: Array2<f32>) -> Array2<f32> {
    let max = grid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        grid.mapv_inplace(|v| v / max);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, hz: f32) -> SampleBuffer {
        let samples = (0..len)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * hz * i as f32 / 16_000.0).sin())
            .collect();
        SampleBuffer::new(samples, 16_000)
    }

    #[test]
    fn shape_is_fixed_for_any_duration() -> Result<(), PipelineError> {
        let mut extractor = MelExtractor::new();
        for len in [8_000, 16_000, 40_000] {
            let tensor = extractor.extract(&tone(len, 440.0))?;
            assert_eq!(tensor.shape(), (N_MELS, MAX_FRAMES), "len = {len}");
        }
        Ok(())
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let empty = SampleBuffer::new(Vec::new(), 16_000);
        assert_eq!(extract_features(&empty), Err(PipelineError::EmptySignal));
    }

    #[test]
    fn silence_stays_finite() -> Result<(), PipelineError> {
        let tensor = extract_features(&SampleBuffer::new(vec![0.0; 16_000], 16_000))?;
        assert!(tensor.as_array().iter().all(|v| v.is_finite()));
        // All energies sit on the floor, so every value is 0 dB.
        assert!(tensor.as_array().iter().take(101).all(|v| v.abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn values_stay_within_db_range() -> Result<(), PipelineError> {
        let tensor = extract_features(&tone(16_000, 1_000.0))?;
        assert!(tensor.max() <= 0.0 + 1e-6);
        assert!(tensor.as_array().iter().all(|&v| v >= -TOP_DB));
        // 101 real frames, the rest padded with the floor.
        assert_eq!(tensor.get(0, 200), Some(-TOP_DB));
        Ok(())
    }

    #[test]
    fn tone_energy_lands_in_matching_band() -> Result<(), PipelineError> {
        let low = extract_features(&tone(16_000, 200.0))?;
        let high = extract_features(&tone(16_000, 4_000.0))?;
        let band_mean = |t: &MelTensor, m: usize| {
            (0..101).filter_map(|f| t.get(m, f)).sum::<f32>() / 101.0
        };
        // 200 Hz peaks filter 6, 4 kHz peaks filter 49.
        assert!(band_mean(&low, 6) > band_mean(&high, 6));
        assert!(band_mean(&high, 49) > band_mean(&low, 49));
        Ok(())
    }

    #[test]
    fn foreign_rate_is_resampled() -> Result<(), PipelineError> {
        let buf = SampleBuffer::new(vec![0.05; 44_100], 44_100);
        assert_eq!(extract_features(&buf)?.shape(), (N_MELS, MAX_FRAMES));
        Ok(())
    }

    #[test]
    fn reflect_pad_matches_edge_reflection() {
        let x: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let padded = reflect_pad(&x, 3);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn filter_rows_are_l1_normalised_or_empty() {
        let bank = mel_filterbank(N_MELS, N_FFT, PIPELINE_SAMPLE_RATE);
        for row in bank.rows() {
            let sum = row.sum();
            assert!(sum == 0.0 || (sum - 1.0).abs() < 1e-5, "row sum {sum}");
        }
    }

    #[test]
    fn only_row_two_is_empty_at_pipeline_settings() {
        let bank = mel_filterbank(N_MELS, N_FFT, PIPELINE_SAMPLE_RATE);
        let empty: Vec<usize> = bank
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.sum() == 0.0)
            .map(|(m, _)| m)
            .collect();
        assert_eq!(empty, vec![2]);
        assert!((bank[[0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_range_is_asymmetric() {
        let positive = Array2::from_elem((2, 2), 2.0f32);
        assert!(normalize_range(positive).iter().all(|&v| (v - 1.0).abs() < f32::EPSILON));

        let negative = Array2::from_elem((2, 2), -40.0f32);
        assert!(normalize_range(negative).iter().all(|&v| (v + 40.0).abs() < f32::EPSILON));
    }

    #[test]
    fn long_spectrogram_is_truncated() {
        let db = Array2::from_elem((N_MELS, 300), -3.0f32);
        let fixed = fix_frames(&db);
        assert_eq!(fixed.dim(), (N_MELS, MAX_FRAMES));
        assert!(fixed.iter().all(|&v| (v + 3.0).abs() < f32::EPSILON));
    }

    #[test]
    fn mel_round_trip() {
        for hz in [0.0f32, 100.0, 1_000.0, 8_000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.5);
        }
    }
}
