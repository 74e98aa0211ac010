//! Synthetic/demo mode: precomputed results sampled at random.
//!
//! Only reachable through an explicit entry point; the inference path never
//! substitutes these results.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use rand::Rng;
use serde::Deserialize;
use steth_core::frame::{Category, ClassificationResult};

use crate::postprocess::argmax;

/// One precomputed asset result.
#[derive(Clone, Debug, Deserialize)]
pub struct DemoEntry {
    /// Asset the probabilities were computed from.
    pub asset: String,
    pub category: Category,
    /// Probabilities in the category's label order.
    pub probabilities: Vec<f32>,
}

/// Library of precomputed results, one per bundled recording.
#[derive(Clone, Debug, Deserialize)]
pub struct DemoLibrary {
    entries: Vec<DemoEntry>,
}

impl DemoLibrary {
    /// Parse a JSON library (`{ "entries": [...] }`), validating every entry.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, an empty library, or an entry whose
    /// probability count does not match its category.
    pub fn from_json(json: &str) -> Result<Self> {
        let library: Self = serde_json::from_str(json).context("Bibliothèque démo invalide")?;
        ensure!(!library.entries.is_empty(), "Bibliothèque démo vide");
        for entry in &library.entries {
            ensure!(
                entry.probabilities.len() == entry.category.num_classes(),
                "{}: {} probabilités pour {} classes",
                entry.asset,
                entry.probabilities.len(),
                entry.category.num_classes()
            );
        }
        Ok(library)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {}", path.display()))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick a random entry of `category`, returned as a result flagged `synthetic`.
    ///
    /// `None` when the library holds nothing for that category.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        category: Category,
        rng: &mut R,
    ) -> Option<(String, ClassificationResult)> {
        let matching: Vec<&DemoEntry> = self
            .entries
            .iter()
            .filter(|e| e.category == category)
            .collect();
        if matching.is_empty() {
            return None;
        }
        let entry = matching[rng.random_range(0..matching.len())];
        log::info!("Demo mode: serving precomputed result for {}", entry.asset);
        Some((entry.asset.clone(), to_result(entry)))
    }
}

fn to_result(entry: &DemoEntry) -> ClassificationResult {
    let labels = entry.category.labels();
    let best = argmax(&entry.probabilities).unwrap_or(0);
    let confidence = entry.probabilities.get(best).copied().unwrap_or(0.0);
    let label = labels.get(best).copied().unwrap_or(entry.category.normal_label());
    ClassificationResult {
        label: label.to_string(),
        category: entry.category,
        probabilities: labels
            .iter()
            .zip(&entry.probabilities)
            .map(|(l, &p)| ((*l).to_string(), p))
            .collect(),
        confidence,
        risk_tier: steth_core::frame::RiskTier::from_prediction(
            label == entry.category.normal_label(),
            confidence,
        ),
        synthetic: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const LIBRARY: &str = r#"{
        "entries": [
            { "asset": "normal_01.wav", "category": "infectious", "probabilities": [0.92, 0.05, 0.03] },
            { "asset": "pneumonia_04.wav", "category": "infectious", "probabilities": [0.10, 0.85, 0.05] },
            { "asset": "copd_02.wav", "category": "obstructive", "probabilities": [0.2, 0.7, 0.1] }
        ]
    }"#;

    #[test]
    fn samples_are_flagged_synthetic() -> Result<()> {
        let library = DemoLibrary::from_json(LIBRARY)?;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let Some((asset, result)) = library.sample(Category::Infectious, &mut rng) else {
                panic!("infectious entries exist");
            };
            assert!(result.synthetic);
            assert!(asset == "normal_01.wav" || asset == "pneumonia_04.wav");
        }
        Ok(())
    }

    #[test]
    fn single_entry_category_is_deterministic() -> Result<()> {
        let library = DemoLibrary::from_json(LIBRARY)?;
        let mut rng = StdRng::seed_from_u64(1);
        let Some((_, result)) = library.sample(Category::Obstructive, &mut rng) else {
            panic!("obstructive entry exists");
        };
        assert_eq!(result.label, "COPD");
        assert!((result.confidence - 0.7).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn mismatched_probability_count_is_rejected() {
        let json = r#"{ "entries": [ { "asset": "x.wav", "category": "obstructive", "probabilities": [1.0] } ] }"#;
        assert!(DemoLibrary::from_json(json).is_err());
    }

    #[test]
    fn missing_category_yields_none() -> Result<()> {
        let json = r#"{ "entries": [ { "asset": "x.wav", "category": "infectious", "probabilities": [1.0, 0.0, 0.0] } ] }"#;
        let library = DemoLibrary::from_json(json)?;
        assert!(library.sample(Category::Obstructive, &mut StdRng::seed_from_u64(0)).is_none());
        Ok(())
    }
}
