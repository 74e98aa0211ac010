use realfft::RealFftPlanner;

/// FFT pipeline: Hann-windowed one-sided power spectrum using realfft.
///
/// Pre-allocates the FFT plan and scratch buffers; frames are processed without
/// reallocating.
///
/// # Example
/// ```
/// use steth_audio::fft::FftPipeline;
/// let fft = FftPipeline::new(400);
/// assert_eq!(fft.num_bins(), 201);
/// ```
pub struct FftPipeline {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<realfft::num_complex::Complex<f32>>,
    scratch: Vec<realfft::num_complex::Complex<f32>>,
    power: Vec<f32>,
    plan: std::sync::Arc<dyn realfft::RealToComplex<f32>>,
    /// Hann window coefficients.
    window: Vec<f32>,
}

impl FftPipeline {
    /// Create a new FFT pipeline with the given window size.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let power = vec![0.0; spectrum_buf.len()];

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            power,
            plan,
            window: hann_window(size),
        }
    }

    /// Window `samples` (zero-padded/truncated to the FFT size) and return the
    /// one-sided power spectrum `(re² + im²) / n_fft`, bins `0..=n_fft/2`.
    ///
    /// # Example
    /// ```
    /// use steth_audio::fft::FftPipeline;
    /// let mut fft = FftPipeline::new(256);
    /// let samples = vec![0.0f32; 256];
    /// let spectrum = fft.power_spectrum(&samples);
    /// assert_eq!(spectrum.len(), 129); // N/2 + 1
    /// assert!(spectrum.iter().all(|&p| p == 0.0));
    /// ```
    pub fn power_spectrum(&mut self, samples: &[f32]) -> &[f32] {
        let n = self.fft_size.min(samples.len());

        // Copy and window
        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n {
                samples[i] * self.window[i]
            } else {
                0.0
            };
        }

        // Forward FFT
        if let Err(e) = self.plan.process_with_scratch(
            &mut self.input_buf,
            &mut self.spectrum_buf,
            &mut self.scratch,
        ) {
            log::warn!("FFT failed, emitting a silent frame: {e}");
            self.power.fill(0.0);
            return &self.power;
        }

        let scale = self.fft_size as f32;
        for (p, c) in self.power.iter_mut().zip(&self.spectrum_buf) {
            *p = (c.re * c.re + c.im * c.im) / scale;
        }
        &self.power
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of one-sided bins (`n_fft/2 + 1`).
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.power.len()
    }
}

/// Symmetric Hann window `0.5 × (1 − cos(2πn / (N−1)))`.
///
/// A single-point window is `[1.0]`.
#[must_use]
pub fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size as f32 - 1.0)).cos())
        })
        .collect()
}
