use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};

/// Input shape a scoring model was trained against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelInput {
    /// Raw waveform `[1, samples, 1]`, padded/truncated to `samples`.
    Waveform {
        /// Fixed sample count, e.g. 32 000 (2 s at 16 kHz).
        samples: usize,
    },
    /// Log-mel tensor `[1, 64, 256, 1]`.
    MelSpectrogram,
}

impl ModelInput {
    /// Declared input tensor shape.
    ///
    /// # Example
    /// ```
    /// use steth_core::traits::ModelInput;
    /// assert_eq!(ModelInput::Waveform { samples: 32_000 }.shape(), vec![1, 32_000, 1]);
    /// assert_eq!(ModelInput::MelSpectrogram.shape(), vec![1, 64, 256, 1]);
    /// ```
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        match *self {
            Self::Waveform { samples } => vec![1, samples, 1],
            Self::MelSpectrogram => vec![1, crate::N_MELS, crate::MAX_FRAMES, 1],
        }
    }
}

/// Opaque classification model: one raw score per class.
///
/// Implémenté par : `DenseModel`, `FnModel`.
///
/// # Example
/// ```
/// use ndarray::ArrayViewD;
/// use steth_core::traits::{ModelInput, ScoringModel};
///
/// struct Constant;
/// impl ScoringModel for Constant {
///     fn input(&self) -> ModelInput { ModelInput::Waveform { samples: 4 } }
///     fn num_classes(&self) -> usize { 3 }
///     fn score(&self, _input: ArrayViewD<'_, f32>) -> anyhow::Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0, 0.0])
///     }
///     fn name(&self) -> &str { "constant" }
/// }
/// ```
pub trait ScoringModel: Send + Sync {
    /// Shape the model expects.
    fn input(&self) -> ModelInput;

    /// Length of the score vector `score` returns.
    fn num_classes(&self) -> usize;

    /// Raw (pre-softmax) scores for a tensor shaped as `input().shape()`.
    ///
    /// # Errors
    /// Returns an error if inference fails.
    fn score(&self, input: ArrayViewD<'_, f32>) -> anyhow::Result<Vec<f32>>;

    /// Nom lisible pour les logs.
    fn name(&self) -> &str;
}
