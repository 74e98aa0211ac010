// PCM decoding, resampling, signal statistics, and log-mel feature extraction for stethoscan.

pub mod decode;
pub mod fft;
pub mod mel;
pub mod resample;
pub mod signal;
pub mod smoothing;
