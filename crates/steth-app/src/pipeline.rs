use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use steth_audio::decode::decode_file;
use steth_audio::signal::{dominant_frequency, rms};
use steth_classify::{ClassifierAdapter, DenseModel};
use steth_core::config::{Fallback, PipelineConfig};
use steth_core::frame::{
    ClassificationResult, DiagnosisResult, SampleBuffer, SensorReading, SignalType,
};

/// Which stage produced the reported result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Classifier,
    Rules,
    Default,
    Demo,
}

impl ResultSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Rules => "rules",
            Self::Default => "default",
            Self::Demo => "demo",
        }
    }
}

/// Outcome of one recording. Exactly one of `classification` / `diagnosis` is set.
#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub file: String,
    pub source: ResultSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<DiagnosisResult>,
    /// Why the classifier result was not used, when it was not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Decode → classify → degrade, for one configuration.
///
/// Shared read-only across batch workers.
pub struct Analyzer {
    config: PipelineConfig,
    adapter: ClassifierAdapter,
    signal: SignalType,
}

impl Analyzer {
    /// Build from config, loading the configured model if any.
    ///
    /// A model that fails to load is logged and skipped: analysis then runs on
    /// the fallback path only.
    #[must_use]
    pub fn new(config: PipelineConfig, signal: SignalType) -> Self {
        let mut adapter = ClassifierAdapter::new();
        if let Some(path) = config.model.as_deref() {
            if let Err(e) = load_model(&mut adapter, &config, path) {
                log::warn!("Modèle non chargé ({}) : {e:#}", path.display());
            }
        }
        Self {
            config,
            adapter,
            signal,
        }
    }

    /// Use an already-configured adapter.
    #[must_use]
    pub fn with_adapter(
        config: PipelineConfig,
        adapter: ClassifierAdapter,
        signal: SignalType,
    ) -> Self {
        Self {
            config,
            adapter,
            signal,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyse a WAV file. Never fails: every error degrades to a fallback result.
    #[must_use]
    pub fn analyze_path(&self, path: &Path) -> Analysis {
        let file = path.display().to_string();
        match decode_file(path) {
            Ok(buffer) => self.analyze_buffer(file, &buffer),
            Err(e) => {
                log::warn!("{file} : décodage impossible, résultat par défaut ({e:#})");
                self.default_result(file, format!("{e:#}"))
            }
        }
    }

    /// Analyse an already-decoded 16 kHz buffer.
    #[must_use]
    pub fn analyze_buffer(&self, file: String, buffer: &SampleBuffer) -> Analysis {
        let reason = match self.adapter.predict_with_timeout(buffer, self.config.timeout()) {
            Ok(classification) => {
                log::info!(
                    "{file} : {} ({:.0}%)",
                    classification.label,
                    classification.confidence * 100.0
                );
                return Analysis {
                    file,
                    source: ResultSource::Classifier,
                    classification: Some(classification),
                    diagnosis: None,
                    fallback_reason: None,
                };
            }
            Err(e) => {
                let level = if e.is_recoverable() {
                    log::Level::Info
                } else {
                    log::Level::Warn
                };
                log::log!(level, "{file} : classifieur indisponible ({e})");
                e.to_string()
            }
        };

        match self.config.fallback {
            Fallback::Rules if !buffer.is_empty() => {
                log::info!("{file} : repli sur les règles");
                let diagnosis = steth_risk::evaluate(&reading_from(buffer, self.signal));
                Analysis {
                    file,
                    source: ResultSource::Rules,
                    classification: None,
                    diagnosis: Some(diagnosis),
                    fallback_reason: Some(reason),
                }
            }
            _ => {
                log::info!("{file} : résultat par défaut");
                self.default_result(file, reason)
            }
        }
    }

    fn default_result(&self, file: String, reason: String) -> Analysis {
        Analysis {
            file,
            source: ResultSource::Default,
            classification: Some(ClassificationResult::safe_default(self.config.category)),
            diagnosis: None,
            fallback_reason: Some(reason),
        }
    }
}

fn load_model(adapter: &mut ClassifierAdapter, config: &PipelineConfig, path: &Path) -> Result<()> {
    let model = DenseModel::load(path)?;
    adapter
        .load(config.category, Arc::new(model))
        .with_context(|| format!("Modèle incompatible avec {:?}", config.category))
}

/// Signal statistics of a whole recording, as a single-channel sensor reading.
#[must_use]
pub fn reading_from(buffer: &SampleBuffer, signal: SignalType) -> SensorReading {
    let level = rms(buffer.samples());
    let frequency = dominant_frequency(buffer.samples(), buffer.sample_rate());
    log::debug!("Signal stats: rms={level:.4} f={frequency:.1} Hz");
    match signal {
        SignalType::Lung => SensorReading {
            frequency,
            lung_rms: level,
            lung_detected: true,
            ..SensorReading::default()
        },
        SignalType::Heart => SensorReading {
            frequency,
            heart_rms: level,
            heart_detected: true,
            ..SensorReading::default()
        },
    }
}

/// Human-readable summary of one analysis.
#[must_use]
pub fn render_text(analysis: &Analysis) -> String {
    let mut out = format!("{} [{}]\n", analysis.file, analysis.source.as_str());
    if let Some(c) = &analysis.classification {
        out.push_str(&format!(
            "  {} ({:.1}%), risque {:?}{}\n",
            c.label,
            c.confidence * 100.0,
            c.risk_tier,
            if c.synthetic { ", synthétique" } else { "" }
        ));
        for (label, p) in &c.probabilities {
            out.push_str(&format!("    {label:<10} {:>5.1}%\n", p * 100.0));
        }
    }
    if let Some(d) = &analysis.diagnosis {
        out.push_str(&render_diagnosis(d));
    }
    if let Some(reason) = &analysis.fallback_reason {
        out.push_str(&format!("  (repli : {reason})\n"));
    }
    out
}

#[must_use]
pub fn render_diagnosis(d: &DiagnosisResult) -> String {
    format!(
        "  {} : {}% ({}), canal {}, {:.1} Hz, confiance {:.2}\n  {}\n",
        d.diagnosis,
        d.risk_percentage,
        d.status.as_str(),
        d.signal_type.as_str(),
        d.frequency_used,
        d.confidence,
        d.recommendation
    )
}

/// Serialize any result as pretty JSON.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Sérialisation JSON")
}
