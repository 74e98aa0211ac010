use std::borrow::Cow;

use steth_core::frame::SampleBuffer;

/// Linear-interpolation sample-rate conversion.
///
/// Output length is `floor(len × to_rate / from_rate)`. Output sample `i` reads
/// source position `i × from_rate / to_rate` and blends the floor/ceil neighbours,
/// the ceil index clamped to the last sample. Equal rates borrow the input unchanged.
/// A zero rate on either side yields an empty output.
///
/// # Example
/// ```
/// use steth_audio::resample::resample;
/// let input = [0.0f32, 1.0, 2.0, 3.0];
/// let up = resample(&input, 2, 4);
/// assert_eq!(up.len(), 8);
/// assert!((up[1] - 0.5).abs() < 1e-6);
/// assert_eq!(&*resample(&input, 8_000, 8_000), &input[..]);
/// ```
#[must_use]
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(input);
    }
    if from_rate == 0 || to_rate == 0 || input.is_empty() {
        return Cow::Owned(Vec::new());
    }

    let out_len = (input.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    let step = f64::from(from_rate) / f64::from(to_rate);
    let last = input.len() - 1;

    let output = (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            input[lo] + (input[hi] - input[lo]) * frac
        })
        .collect();

    Cow::Owned(output)
}

/// Resample a whole buffer, returning a new one tagged with `to_rate`.
///
/// # Example
/// ```
/// use steth_audio::resample::resample_buffer;
/// use steth_core::frame::SampleBuffer;
/// let buf = SampleBuffer::new(vec![0.0; 44_100], 44_100);
/// let out = resample_buffer(&buf, 16_000);
/// assert_eq!(out.len(), 16_000);
/// assert_eq!(out.sample_rate(), 16_000);
/// ```
#[must_use]
pub fn resample_buffer(buffer: &SampleBuffer, to_rate: u32) -> SampleBuffer {
    if buffer.sample_rate() == to_rate {
        return buffer.clone();
    }
    log::debug!(
        "Resampling {} samples {}Hz -> {}Hz",
        buffer.len(),
        buffer.sample_rate(),
        to_rate
    );
    let samples = resample(buffer.samples(), buffer.sample_rate(), to_rate).into_owned();
    SampleBuffer::new(samples, to_rate)
}
