use thiserror::Error;

/// Errors raised by the decode → features → classify pipeline.
///
/// The rule engine never produces one of these: it degrades confidence instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Container too short or its header cannot be parsed.
    #[error("Conteneur audio invalide : {0}")]
    InvalidContainer(String),

    /// Sample encoding the decoder does not handle.
    #[error("Format non supporté : {bits_per_sample} bits par échantillon")]
    UnsupportedFormat {
        /// Bit depth declared by the container.
        bits_per_sample: u16,
    },

    /// A zero-length buffer reached the extractor or the classifier.
    #[error("Signal vide")]
    EmptySignal,

    /// `predict` called before a model/category was loaded.
    #[error("Aucun modèle chargé")]
    ModelNotLoaded,

    /// The scoring call exceeded the caller's deadline.
    #[error("Inférence expirée après {secs:.1} s")]
    Timeout {
        /// Deadline that elapsed, in seconds.
        secs: f32,
    },

    /// The scoring function failed or returned a malformed score vector.
    #[error("Erreur du modèle : {0}")]
    Model(String),

    /// Invalid configuration value.
    #[error("Configuration invalide : {0}")]
    Config(String),
}

impl PipelineError {
    /// `true` when the caller can recover by falling back to the rule engine
    /// or a safe default rather than surfacing the failure.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ModelNotLoaded | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_mentions_bit_depth() {
        let err = PipelineError::UnsupportedFormat { bits_per_sample: 8 };
        assert!(err.to_string().contains('8'));
    }

    #[test]
    fn recoverable_variants() {
        assert!(PipelineError::ModelNotLoaded.is_recoverable());
        assert!(PipelineError::Timeout { secs: 15.0 }.is_recoverable());
        assert!(!PipelineError::EmptySignal.is_recoverable());
        assert!(!PipelineError::InvalidContainer("short".into()).is_recoverable());
    }
}
