use crate::signal;

/// Live level meter: per-chunk RMS through an exponential moving average with
/// attack/release asymmetry.
///
/// Fast attack (responds quickly to increases), slow release (decays slowly).
///
/// # Example
/// ```
/// use steth_audio::smoothing::LevelMeter;
/// let mut meter = LevelMeter::new(0.3);
/// let level = meter.push(&[0.5, -0.5, 0.5, -0.5]);
/// assert!((level - 0.5).abs() < 1e-6);
/// ```
pub struct LevelMeter {
    attack: f32,
    release: f32,
    level: f32,
    peak_hold: f32,
    initialized: bool,
}

impl LevelMeter {
    /// Create a new meter.
    ///
    /// `alpha` controls base responsiveness. Attack = alpha * 2, release = alpha * 0.5.
    #[must_use]
    pub fn new(alpha: f32) -> Self {
        let a = alpha.clamp(0.01, 1.0);
        Self {
            attack: (a * 2.0).min(1.0),
            release: (a * 0.5).max(0.01),
            level: 0.0,
            peak_hold: 0.0,
            initialized: false,
        }
    }

    /// Feed one chunk of samples and return the smoothed RMS level.
    pub fn push(&mut self, chunk: &[f32]) -> f32 {
        let current = signal::rms(chunk);
        self.peak_hold = self.peak_hold.max(signal::peak(chunk));

        if !self.initialized {
            self.level = current;
            self.initialized = true;
            return current;
        }

        self.level = self.ar(current, self.level);
        self.level
    }

    /// Smoothed level from the last `push`.
    #[must_use]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Largest absolute sample seen since creation or the last `reset`.
    #[must_use]
    pub fn peak_hold(&self) -> f32 {
        self.peak_hold
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
        self.peak_hold = 0.0;
        self.initialized = false;
    }

    /// Attack/release smoothing for a single value.
    #[inline(always)]
    fn ar(&self, current: f32, previous: f32) -> f32 {
        let alpha = if current > previous {
            self.attack
        } else {
            self.release
        };
        alpha * current + (1.0 - alpha) * previous
    }
}
