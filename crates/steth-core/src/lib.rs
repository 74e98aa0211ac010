//! Shared types, error taxonomy, and configuration for stethoscan.
//!
//! This crate contains the data model handed between pipeline stages
//! (decoder → extractor → classifier, and the rule engine) plus the
//! `ScoringModel` seam the classifier adapter drives.

pub mod config;
pub mod error;
pub mod frame;
pub mod traits;

pub use config::{Fallback, PipelineConfig};
pub use error::PipelineError;
pub use frame::{
    Category, ClassificationResult, DiagnosisResult, MelTensor, RiskTier, SampleBuffer,
    SensorReading, SignalType, Status,
};
pub use traits::{ModelInput, ScoringModel};

/// Pipeline sample rate (Hz). Every buffer reaching the feature extractor runs at this rate.
pub const PIPELINE_SAMPLE_RATE: u32 = 16_000;

/// Number of mel bands in the feature tensor.
pub const N_MELS: usize = 64;

/// Number of time columns in the feature tensor.
pub const MAX_FRAMES: usize = 256;
