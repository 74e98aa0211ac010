use ndarray::{Array2, Array4, Axis};
use serde::{Deserialize, Serialize};

use crate::{MAX_FRAMES, N_MELS};

/// Buffer mono d'échantillons f32 dans [-1, 1], étiqueté par son sample rate.
///
/// Immuable une fois produit : chaque étape du pipeline en produit un nouveau.
///
/// # Example
/// ```
/// use steth_core::frame::SampleBuffer;
/// let buf = SampleBuffer::new(vec![0.0; 16_000], 16_000);
/// assert_eq!(buf.len(), 16_000);
/// assert_eq!(buf.channels(), 1);
/// assert!((buf.duration_secs() - 1.0).abs() < f32::EPSILON);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Wraps mono samples recorded at `sample_rate` Hz.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples, mono.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consumes the buffer and returns the raw samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1: the decoder downmixes before a buffer exists.
    #[must_use]
    pub fn channels(&self) -> u16 {
        1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Durée en secondes. 0 si le sample rate est nul.
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Log-mel energy grid of exactly `N_MELS × MAX_FRAMES` (64 × 256).
///
/// The constructor is the only way in, so the shape invariant holds for every
/// instance regardless of the input duration that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct MelTensor {
    data: Array2<f32>,
}

impl MelTensor {
    /// Wraps a grid, returning `None` unless its shape is exactly 64 × 256.
    ///
    /// # Example
    /// ```
    /// use ndarray::Array2;
    /// use steth_core::frame::MelTensor;
    /// assert!(MelTensor::from_array(Array2::zeros((64, 256))).is_some());
    /// assert!(MelTensor::from_array(Array2::zeros((64, 100))).is_none());
    /// ```
    #[must_use]
    pub fn from_array(data: Array2<f32>) -> Option<Self> {
        (data.dim() == (N_MELS, MAX_FRAMES)).then_some(Self { data })
    }

    /// `(n_mels, max_frames)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    /// Value at (mel band, frame).
    #[must_use]
    pub fn get(&self, mel: usize, frame: usize) -> Option<f32> {
        self.data.get((mel, frame)).copied()
    }

    /// Largest element of the grid.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Reshape en `[1, n_mels, max_frames, 1]` pour les modèles spectrogramme.
    #[must_use]
    pub fn to_model_input(&self) -> Array4<f32> {
        self.data
            .clone()
            .insert_axis(Axis(0))
            .insert_axis(Axis(3))
    }
}

/// Active label set of the classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// {Normal, Pneumonia, TB}
    #[default]
    Infectious,
    /// {Normal, COPD, Asthma}
    Obstructive,
}

impl Category {
    /// Class labels in model output order. Index 0 is always the normal class.
    #[must_use]
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Infectious => &["Normal", "Pneumonia", "TB"],
            Self::Obstructive => &["Normal", "COPD", "Asthma"],
        }
    }

    #[must_use]
    pub fn num_classes(self) -> usize {
        self.labels().len()
    }

    /// Label of the healthy class.
    #[must_use]
    pub fn normal_label(self) -> &'static str {
        "Normal"
    }
}

/// Coarse bucket derived from the predicted label and its confidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Normal: Low above 0.8 confidence, else Medium.
    /// Abnormal: High above 0.8, Medium above 0.6, else Low.
    ///
    /// # Example
    /// ```
    /// use steth_core::frame::RiskTier;
    /// assert_eq!(RiskTier::from_prediction(true, 0.9), RiskTier::Low);
    /// assert_eq!(RiskTier::from_prediction(false, 0.7), RiskTier::Medium);
    /// ```
    #[must_use]
    pub fn from_prediction(is_normal: bool, confidence: f32) -> Self {
        if is_normal {
            if confidence > 0.8 { Self::Low } else { Self::Medium }
        } else if confidence > 0.8 {
            Self::High
        } else if confidence > 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Labeled, confidence-scored classifier output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Predicted class label.
    pub label: String,
    /// Label set the prediction was made against.
    pub category: Category,
    /// `(label, probability)` for every class, model output order. Sums to 1.
    pub probabilities: Vec<(String, f32)>,
    /// Probability of the predicted class.
    pub confidence: f32,
    pub risk_tier: RiskTier,
    /// `true` for results sampled from the demo library rather than inferred.
    pub synthetic: bool,
}

impl ClassificationResult {
    /// Safe default used when neither the classifier nor the rule engine can run:
    /// "Normal" with 0.9 probability, the remaining mass split evenly.
    ///
    /// # Example
    /// ```
    /// use steth_core::frame::{Category, ClassificationResult};
    /// let r = ClassificationResult::safe_default(Category::Infectious);
    /// assert_eq!(r.label, "Normal");
    /// let total: f32 = r.probabilities.iter().map(|(_, p)| p).sum();
    /// assert!((total - 1.0).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn safe_default(category: Category) -> Self {
        let labels = category.labels();
        let rest = 0.1 / (labels.len().saturating_sub(1)).max(1) as f32;
        let probabilities = labels
            .iter()
            .enumerate()
            .map(|(i, l)| ((*l).to_string(), if i == 0 { 0.9 } else { rest }))
            .collect();
        Self {
            label: category.normal_label().to_string(),
            category,
            probabilities,
            confidence: 0.9,
            risk_tier: RiskTier::from_prediction(true, 0.9),
            synthetic: false,
        }
    }

    /// Probability assigned to `label`, if part of the label set.
    #[must_use]
    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }
}

/// Coarse statistics streamed from the device.
///
/// `frequency == 0.0` means "dominant frequency unavailable".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Dominant frequency estimate (Hz-like, ≥ 0).
    pub frequency: f32,
    /// RMS amplitude on the heart channel.
    pub heart_rms: f32,
    /// RMS amplitude on the lung channel.
    pub lung_rms: f32,
    pub heart_detected: bool,
    pub lung_detected: bool,
}

impl SensorReading {
    /// Channel the rule engine scores: lung wins when both flags are set.
    ///
    /// With no flag set, the louder channel is used (lung on a tie).
    #[must_use]
    pub fn channel(&self) -> SignalType {
        match (self.heart_detected, self.lung_detected) {
            (_, true) => SignalType::Lung,
            (true, false) => SignalType::Heart,
            (false, false) => {
                if self.heart_rms > self.lung_rms {
                    SignalType::Heart
                } else {
                    SignalType::Lung
                }
            }
        }
    }

    /// RMS of the selected channel.
    #[must_use]
    pub fn channel_rms(&self) -> f32 {
        match self.channel() {
            SignalType::Heart => self.heart_rms,
            SignalType::Lung => self.lung_rms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Heart,
    Lung,
}

impl SignalType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Lung => "lung",
        }
    }
}

/// "High Risk" strictly above 50 %.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Normal,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl Status {
    #[must_use]
    pub fn from_risk(risk_percentage: u8) -> Self {
        if risk_percentage > 50 {
            Self::HighRisk
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::HighRisk => "High Risk",
        }
    }
}

/// Output of the rule-based risk engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosisResult {
    pub diagnosis: String,
    /// Integer in [1, 98].
    pub risk_percentage: u8,
    pub signal_type: SignalType,
    /// Frequency value actually used for regime selection.
    pub frequency_used: f32,
    pub status: Status,
    /// In [0.30, 0.95].
    pub confidence: f32,
    pub recommendation: String,
}
