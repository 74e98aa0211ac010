use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use ndarray::{Array1, Array2, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};
use steth_core::traits::{ModelInput, ScoringModel};

use crate::postprocess::softmax;

/// Activation applied after a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Linear,
    /// Normalizes the layer output to a distribution. Only meaningful on the last layer.
    Softmax,
}

/// On-disk layer: `weights` is `[inputs][outputs]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    activation: Activation,
}

/// On-disk model definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ModelFile {
    name: String,
    input: ModelInput,
    layers: Vec<LayerFile>,
}

#[derive(Clone, Debug)]
struct Dense {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

/// Global-average-pooling front end followed by fully-connected layers.
///
/// Waveform inputs `[1, N, 1]` pool to a single feature; mel inputs
/// `[1, 64, 256, 1]` pool over time to 64 per-band means. The last layer's
/// output is returned as-is. The adapter always applies its own softmax, so a
/// `"softmax"` last layer keeps the predicted class but flattens the
/// confidence; `"linear"` logits reproduce the trained probabilities.
///
/// # Example
/// ```
/// use steth_classify::model::DenseModel;
/// use steth_core::traits::ScoringModel;
/// let json = r#"{
///     "name": "minimal",
///     "input": { "kind": "waveform", "samples": 4 },
///     "layers": [ { "weights": [[0.1, 0.2, 0.3]], "bias": [0, 0, 0], "activation": "linear" } ]
/// }"#;
/// let model = DenseModel::from_json(json).unwrap();
/// assert_eq!(model.num_classes(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct DenseModel {
    name: String,
    input: ModelInput,
    layers: Vec<Dense>,
}

impl DenseModel {
    /// Parse and validate a JSON model definition.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, ragged weight matrices, or layer
    /// dimensions that do not chain.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(json).context("Définition de modèle invalide")?;
        ensure!(!file.layers.is_empty(), "Le modèle {} n'a aucune couche", file.name);

        let mut expected_inputs = pooled_features(file.input);
        let mut layers = Vec::with_capacity(file.layers.len());
        for (i, layer) in file.layers.into_iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map_or(0, Vec::len);
            ensure!(
                rows == expected_inputs,
                "Couche {i}: {rows} entrées, {expected_inputs} attendues"
            );
            ensure!(cols > 0, "Couche {i}: aucune sortie");
            ensure!(
                layer.weights.iter().all(|r| r.len() == cols),
                "Couche {i}: matrice de poids irrégulière"
            );
            ensure!(
                layer.bias.len() == cols,
                "Couche {i}: {} biais pour {cols} sorties",
                layer.bias.len()
            );

            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            layers.push(Dense {
                weights: Array2::from_shape_vec((rows, cols), flat)?,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
            expected_inputs = cols;
        }

        Ok(Self {
            name: file.name,
            input: file.input,
            layers,
        })
    }

    /// Read a JSON model definition from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {}", path.display()))?;
        let model =
            Self::from_json(&json).with_context(|| format!("Modèle invalide : {}", path.display()))?;
        log::info!(
            "Loaded model '{}' ({} layers, input {:?})",
            model.name,
            model.layers.len(),
            model.input.shape()
        );
        Ok(model)
    }

    /// Declared `(input shape, output shape)`.
    #[must_use]
    pub fn describe(&self) -> (Vec<usize>, Vec<usize>) {
        (self.input.shape(), vec![1, self.num_classes()])
    }

    fn pool(&self, input: &ArrayViewD<'_, f32>) -> Result<Array1<f32>> {
        let expected = self.input.shape();
        if input.shape() != expected.as_slice() {
            bail!(
                "Tenseur d'entrée {:?}, {:?} attendu",
                input.shape(),
                expected
            );
        }
        let pooled = match self.input {
            ModelInput::Waveform { .. } => {
                Array1::from_elem(1, input.mean().unwrap_or(0.0))
            }
            // [1, mels, frames, 1] → mean over frames → [mels]
            ModelInput::MelSpectrogram => input
                .index_axis(Axis(3), 0)
                .index_axis(Axis(0), 0)
                .mean_axis(Axis(1))
                .context("Spectrogramme vide")?
                .into_dimensionality()?,
        };
        Ok(pooled)
    }
}

/// Feature count after global average pooling.
fn pooled_features(input: ModelInput) -> usize {
    match input {
        ModelInput::Waveform { .. } => 1,
        ModelInput::MelSpectrogram => steth_core::N_MELS,
    }
}

impl ScoringModel for DenseModel {
    fn input(&self) -> ModelInput {
        self.input
    }

    fn num_classes(&self) -> usize {
        self.layers.last().map_or(0, |l| l.bias.len())
    }

    fn score(&self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>> {
        let mut x = self.pool(&input)?;
        for layer in &self.layers {
            x = x.dot(&layer.weights) + &layer.bias;
            match layer.activation {
                Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
                Activation::Softmax => x = Array1::from(softmax(&x.to_vec())),
                Activation::Linear => {}
            }
        }
        Ok(x.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wraps any scoring closure as a [`ScoringModel`].
///
/// # Example
/// ```
/// use steth_classify::model::FnModel;
/// use steth_core::traits::{ModelInput, ScoringModel};
/// let model = FnModel::new("flat", ModelInput::MelSpectrogram, 3, |_| Ok(vec![0.0; 3]));
/// assert_eq!(model.num_classes(), 3);
/// ```
pub struct FnModel<F> {
    name: String,
    input: ModelInput,
    num_classes: usize,
    scorer: F,
}

impl<F> FnModel<F>
where
    F: Fn(ArrayViewD<'_, f32>) -> Result<Vec<f32>> + Send + Sync,
{
    #[must_use]
    pub fn new(name: &str, input: ModelInput, num_classes: usize, scorer: F) -> Self {
        Self {
            name: name.to_string(),
            input,
            num_classes,
            scorer,
        }
    }
}

impl<F> ScoringModel for FnModel<F>
where
    F: Fn(ArrayViewD<'_, f32>) -> Result<Vec<f32>> + Send + Sync,
{
    fn input(&self) -> ModelInput {
        self.input
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn score(&self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>> {
        (self.scorer)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    const WAVEFORM_MODEL: &str = r#"{
        "name": "pooled-dense",
        "input": { "kind": "waveform", "samples": 8 },
        "layers": [
            { "weights": [[1.0, -1.0]], "bias": [0.0, 0.5], "activation": "relu" },
            { "weights": [[1.0, 0.0, 2.0], [0.0, 1.0, 0.0]], "bias": [0.0, 0.0, -1.0], "activation": "linear" }
        ]
    }"#;

    #[test]
    fn waveform_forward_pass() -> Result<()> {
        let model = DenseModel::from_json(WAVEFORM_MODEL)?;
        // mean = 0.25 → relu([0.25, 0.25]) → [0.25, 0.25, -0.5]
        let input = Array3::from_elem((1, 8, 1), 0.25f32).into_dyn();
        let scores = model.score(input.view())?;
        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 0.25).abs() < 1e-6);
        assert!((scores[1] - 0.25).abs() < 1e-6);
        assert!((scores[2] + 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn softmax_head_emits_a_distribution() -> Result<()> {
        let json = r#"{
            "name": "softmax-head",
            "input": { "kind": "waveform", "samples": 4 },
            "layers": [ { "weights": [[1.0, 2.0, 3.0]], "bias": [0.0, 0.0, 0.0], "activation": "softmax" } ]
        }"#;
        let model = DenseModel::from_json(json)?;
        let input = Array3::from_elem((1, 4, 1), 1.0f32).into_dyn();
        let scores = model.score(input.view())?;
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(scores[0] < scores[1] && scores[1] < scores[2]);
        // softmax([1, 2, 3])
        assert!((scores[2] - 0.665_240_9).abs() < 1e-5, "{}", scores[2]);
        Ok(())
    }

    #[test]
    fn wrong_input_shape_is_rejected() -> Result<()> {
        let model = DenseModel::from_json(WAVEFORM_MODEL)?;
        let input = Array3::<f32>::zeros((1, 9, 1)).into_dyn();
        assert!(model.score(input.view()).is_err());
        Ok(())
    }

    #[test]
    fn mel_model_pools_per_band() -> Result<()> {
        let weights: Vec<Vec<f32>> = (0..64).map(|i| vec![if i == 3 { 1.0 } else { 0.0 }, 0.0, 0.0]).collect();
        let json = serde_json::json!({
            "name": "mel",
            "input": { "kind": "mel_spectrogram" },
            "layers": [ { "weights": weights, "bias": [0.0, 0.0, 0.0], "activation": "linear" } ]
        })
        .to_string();
        let model = DenseModel::from_json(&json)?;

        let mut input = Array4::<f32>::zeros((1, 64, 256, 1));
        input.slice_mut(ndarray::s![0, 3, ..128, 0]).fill(-0.5);
        let scores = model.score(input.into_dyn().view())?;
        assert!((scores[0] + 0.25).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn layer_dimensions_must_chain() {
        let json = r#"{
            "name": "broken",
            "input": { "kind": "waveform", "samples": 8 },
            "layers": [
                { "weights": [[1.0, 1.0]], "bias": [0.0, 0.0], "activation": "relu" },
                { "weights": [[1.0, 1.0, 1.0]], "bias": [0.0, 0.0, 0.0], "activation": "linear" }
            ]
        }"#;
        assert!(DenseModel::from_json(json).is_err());
    }

    #[test]
    fn describe_reports_shapes() -> Result<()> {
        let model = DenseModel::from_json(WAVEFORM_MODEL)?;
        assert_eq!(model.describe(), (vec![1, 8, 1], vec![1, 3]));
        Ok(())
    }

    #[test]
    fn load_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.json");
        std::fs::write(&path, WAVEFORM_MODEL)?;
        assert_eq!(DenseModel::load(&path)?.name(), "pooled-dense");
        Ok(())
    }
}
