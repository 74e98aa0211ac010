//! Generic signal helpers shared by the pipeline and live metering.

use crate::fft::FftPipeline;

/// Root-mean-square amplitude. 0 for an empty slice.
///
/// # Example
/// ```
/// use steth_audio::signal::rms;
/// assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
/// assert_eq!(rms(&[]), 0.0);
/// ```
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample.
#[must_use]
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Scale so the largest absolute sample is 1.0. Silence is returned unchanged.
///
/// # Example
/// ```
/// use steth_audio::signal::normalize_peak;
/// assert_eq!(normalize_peak(&[0.25, -0.5]), vec![0.5, -1.0]);
/// assert_eq!(normalize_peak(&[0.0, 0.0]), vec![0.0, 0.0]);
/// ```
#[must_use]
pub fn normalize_peak(samples: &[f32]) -> Vec<f32> {
    let p = peak(samples);
    if p <= f32::EPSILON {
        return samples.to_vec();
    }
    samples.iter().map(|s| s / p).collect()
}

/// Centered moving-average smoothing filter. The window shrinks at the edges;
/// `window <= 1` copies the input.
///
/// # Example
/// ```
/// use steth_audio::signal::moving_average;
/// let out = moving_average(&[0.0, 3.0, 0.0], 3);
/// assert_eq!(out, vec![1.5, 1.0, 1.5]);
/// ```
#[must_use]
pub fn moving_average(samples: &[f32], window: usize) -> Vec<f32> {
    if window <= 1 || samples.is_empty() {
        return samples.to_vec();
    }
    let half = window / 2;
    let n = samples.len();

    // Prefix sums keep this O(n) for long windows.
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &s in samples {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + f64::from(s));
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + window - half).min(n);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}

/// Non-overlapping chunks of `size` samples; the last chunk may be shorter.
/// `size == 0` yields nothing.
///
/// # Example
/// ```
/// use steth_audio::signal::chunks;
/// let data = [1.0f32; 10];
/// let sizes: Vec<usize> = chunks(&data, 4).map(<[f32]>::len).collect();
/// assert_eq!(sizes, vec![4, 4, 2]);
/// ```
pub fn chunks(samples: &[f32], size: usize) -> impl Iterator<Item = &[f32]> {
    let take = if size == 0 { 0 } else { samples.len() };
    samples[..take].chunks(size.max(1))
}

/// Pad with zeros or truncate to exactly `len` samples.
#[must_use]
pub fn fit_length(samples: &[f32], len: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&samples[..samples.len().min(len)]);
    out.resize(len, 0.0);
    out
}

/// FFT size used for the dominant-frequency estimate (~0.5 s at 16 kHz).
const DOMINANT_FFT_SIZE: usize = 8192;

/// Dominant frequency in Hz: the strongest non-DC bin of a Hann-windowed FFT,
/// averaged over consecutive frames. Returns 0.0 ("unavailable") for empty or
/// silent input.
///
/// # Example
/// ```
/// use steth_audio::signal::dominant_frequency;
/// let tone: Vec<f32> = (0..16_000)
///     .map(|i| (2.0 * std::f32::consts::PI * 250.0 * i as f32 / 16_000.0).sin())
///     .collect();
/// let f = dominant_frequency(&tone, 16_000);
/// assert!((f - 250.0).abs() < 4.0);
/// assert_eq!(dominant_frequency(&[0.0; 1024], 16_000), 0.0);
/// ```
#[must_use]
pub fn dominant_frequency(samples: &[f32], sample_rate: u32) -> f32 {
    if samples.is_empty() || sample_rate == 0 || peak(samples) <= f32::EPSILON {
        return 0.0;
    }

    let size = DOMINANT_FFT_SIZE.min(samples.len().next_power_of_two()).max(2);
    let mut fft = FftPipeline::new(size);
    let mut accum = vec![0.0f64; fft.num_bins()];

    for frame in samples.chunks(size) {
        for (a, &p) in accum.iter_mut().zip(fft.power_spectrum(frame)) {
            *a += f64::from(p);
        }
    }

    let (bin, power) = accum
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0.0f64), |best, (i, &p)| if p > best.1 { (i, p) } else { best });

    if power <= 0.0 {
        return 0.0;
    }
    bin as f32 * sample_rate as f32 / size as f32
}
