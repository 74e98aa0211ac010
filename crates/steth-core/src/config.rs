use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::frame::Category;

/// Configuration complète du pipeline d'analyse.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use steth_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.timeout_secs, 15);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PipelineConfig {
    // === Classifieur ===
    /// Label set of the loaded model.
    pub category: Category,
    /// JSON model definition. `None` = no classifier, rules only.
    pub model: Option<PathBuf>,
    /// Deadline for one inference call, in seconds [1, 120].
    pub timeout_secs: u64,

    // === Analyse ===
    /// What to return when the classifier cannot.
    pub fallback: Fallback,
    /// Precomputed results for `stethoscan demo`.
    pub demo_library: Option<PathBuf>,
}

/// Degradation path when classification fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Score signal statistics with the rule engine.
    #[default]
    Rules,
    /// Return the safe "Normal" default.
    Default,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            category: Category::Infectious,
            model: None,
            timeout_secs: 15,
            fallback: Fallback::Rules,
            demo_library: None,
        }
    }
}

impl PipelineConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        let clamped = self.timeout_secs.clamp(1, 120);
        if clamped != self.timeout_secs {
            log::warn!(
                "timeout_secs = {} hors de [1, 120], ramené à {clamped}",
                self.timeout_secs
            );
            self.timeout_secs = clamped;
        }
    }

    /// Inference deadline.
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    classifier: Option<ClassifierSection>,
    analysis: Option<AnalysisSection>,
}

#[derive(Deserialize)]
struct ClassifierSection {
    category: Option<Category>,
    model: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
struct AnalysisSection {
    fallback: Option<Fallback>,
    demo_library: Option<PathBuf>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// Relative `model` / `demo_library` paths resolve against the config file's directory.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use steth_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&content, base)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))
}

/// Parse TOML text, resolving relative paths against `base`.
///
/// # Errors
/// Returns [`PipelineError::Config`] if the text is not valid TOML for this schema.
pub fn parse_config(content: &str, base: &Path) -> Result<PipelineConfig> {
    let file: ConfigFile =
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
    let mut config = PipelineConfig::default();

    if let Some(c) = file.classifier {
        if let Some(v) = c.category {
            config.category = v;
        }
        if let Some(v) = c.model {
            config.model = Some(resolve(base, v));
        }
        if let Some(v) = c.timeout_secs {
            config.timeout_secs = v;
        }
    }

    if let Some(a) = file.analysis {
        if let Some(v) = a.fallback {
            config.fallback = v;
        }
        if let Some(v) = a.demo_library {
            config.demo_library = Some(resolve(base, v));
        }
    }

    config.clamp_all();
    Ok(config)
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
