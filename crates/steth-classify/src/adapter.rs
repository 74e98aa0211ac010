use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ndarray::{Array3, ArrayD};
use steth_audio::mel::MelExtractor;
use steth_audio::resample::resample;
use steth_audio::signal::fit_length;
use steth_core::PIPELINE_SAMPLE_RATE;
use steth_core::error::PipelineError;
use steth_core::frame::{Category, ClassificationResult, MelTensor, SampleBuffer};
use steth_core::traits::{ModelInput, ScoringModel};

use crate::postprocess::classify_scores;

/// Model handle plus the label set it was loaded for.
#[derive(Clone)]
struct LoadedModel {
    category: Category,
    model: Arc<dyn ScoringModel>,
}

/// Shapes inputs for the loaded model, runs it, and turns raw scores into a
/// [`ClassificationResult`].
///
/// `load` takes `&mut self` and `predict` takes `&self`, so a reload can never
/// overlap an in-flight prediction on the same adapter.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use steth_classify::{ClassifierAdapter, FnModel};
/// use steth_core::frame::{Category, SampleBuffer};
/// use steth_core::traits::ModelInput;
///
/// let mut adapter = ClassifierAdapter::new();
/// let model = FnModel::new("const", ModelInput::Waveform { samples: 32_000 }, 3, |_| {
///     Ok(vec![0.0, 3.0, 0.0])
/// });
/// adapter.load(Category::Infectious, Arc::new(model)).unwrap();
/// let result = adapter.predict(&SampleBuffer::new(vec![0.1; 16_000], 16_000)).unwrap();
/// assert_eq!(result.label, "Pneumonia");
/// ```
#[derive(Default)]
pub struct ClassifierAdapter {
    loaded: Option<LoadedModel>,
}

impl ClassifierAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a category and install its model.
    ///
    /// # Errors
    /// `PipelineError::Model` if the model's class count differs from the
    /// category's label count.
    pub fn load(
        &mut self,
        category: Category,
        model: Arc<dyn ScoringModel>,
    ) -> Result<(), PipelineError> {
        if model.num_classes() != category.num_classes() {
            return Err(PipelineError::Model(format!(
                "'{}' produit {} classes, {:?} en attend {}",
                model.name(),
                model.num_classes(),
                category,
                category.num_classes()
            )));
        }
        log::info!(
            "Classifier '{}' loaded for {:?} (input {:?})",
            model.name(),
            category,
            model.input().shape()
        );
        self.loaded = Some(LoadedModel { category, model });
        Ok(())
    }

    /// Drop the loaded model. Subsequent predictions fail with `ModelNotLoaded`.
    pub fn unload(&mut self) {
        self.loaded = None;
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Category of the loaded model, if any.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.loaded.as_ref().map(|l| l.category)
    }

    /// Classify a buffer at any rate, shaping it as the model declares.
    ///
    /// Waveform and mel inputs are both built from the buffer resampled to 16 kHz.
    ///
    /// # Errors
    /// `ModelNotLoaded`, `EmptySignal`, or `Model` if scoring fails.
    pub fn predict(&self, buffer: &SampleBuffer) -> Result<ClassificationResult, PipelineError> {
        let loaded = self.loaded.as_ref().ok_or(PipelineError::ModelNotLoaded)?;
        run_inference(loaded, buffer)
    }

    /// Classify an already-extracted mel tensor (spectrogram models only).
    ///
    /// # Errors
    /// `ModelNotLoaded`, or `Model` if the loaded model expects a waveform or scoring fails.
    pub fn predict_tensor(&self, tensor: &MelTensor) -> Result<ClassificationResult, PipelineError> {
        let loaded = self.loaded.as_ref().ok_or(PipelineError::ModelNotLoaded)?;
        if loaded.model.input() != ModelInput::MelSpectrogram {
            return Err(PipelineError::Model(format!(
                "'{}' attend une forme d'onde, pas un spectrogramme",
                loaded.model.name()
            )));
        }
        score(loaded, tensor.to_model_input().into_dyn())
    }

    /// Like [`predict`](Self::predict), bounded by `timeout`.
    ///
    /// Inference runs on a worker thread; if the deadline passes the call returns
    /// `Timeout` and the worker's eventual result is discarded.
    ///
    /// # Errors
    /// Same as `predict`, plus `Timeout`.
    pub fn predict_with_timeout(
        &self,
        buffer: &SampleBuffer,
        timeout: Duration,
    ) -> Result<ClassificationResult, PipelineError> {
        let loaded = self.loaded.clone().ok_or(PipelineError::ModelNotLoaded)?;
        if buffer.is_empty() {
            return Err(PipelineError::EmptySignal);
        }

        let (tx, rx) = flume::bounded(1);
        let buffer = buffer.clone();
        thread::Builder::new()
            .name("steth-infer".to_string())
            .spawn(move || {
                // The receiver may be gone after a timeout; the result is dropped then.
                let _ = tx.send(run_inference(&loaded, &buffer));
            })
            .map_err(|e| PipelineError::Model(format!("thread d'inférence : {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(flume::RecvTimeoutError::Timeout) => {
                log::warn!("Inference exceeded {:.1}s", timeout.as_secs_f32());
                Err(PipelineError::Timeout {
                    secs: timeout.as_secs_f32(),
                })
            }
            Err(flume::RecvTimeoutError::Disconnected) => Err(PipelineError::Model(
                "le thread d'inférence s'est arrêté sans résultat".into(),
            )),
        }
    }
}

fn run_inference(
    loaded: &LoadedModel,
    buffer: &SampleBuffer,
) -> Result<ClassificationResult, PipelineError> {
    if buffer.is_empty() {
        return Err(PipelineError::EmptySignal);
    }

    let input = match loaded.model.input() {
        ModelInput::Waveform { samples } => waveform_input(buffer, samples),
        ModelInput::MelSpectrogram => MelExtractor::new()
            .extract(buffer)?
            .to_model_input()
            .into_dyn(),
    };
    score(loaded, input)
}

/// Resample to the pipeline rate, pad/truncate to `samples`, wrap as `[1, samples, 1]`.
fn waveform_input(buffer: &SampleBuffer, samples: usize) -> ArrayD<f32> {
    let at_rate = resample(buffer.samples(), buffer.sample_rate(), PIPELINE_SAMPLE_RATE);
    let fitted = fit_length(&at_rate, samples);
    Array3::from_shape_fn((1, samples, 1), |(_, i, _)| fitted[i]).into_dyn()
}

fn score(loaded: &LoadedModel, input: ArrayD<f32>) -> Result<ClassificationResult, PipelineError> {
    let scores = loaded
        .model
        .score(input.view())
        .map_err(|e| PipelineError::Model(format!("{e:#}")))?;
    log::debug!("Raw scores from '{}': {scores:?}", loaded.model.name());
    classify_scores(&scores, loaded.category)
}
