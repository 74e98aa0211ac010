use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::pipeline::{Analysis, Analyzer, ResultSource};

/// WAV files directly inside `dir`, sorted by name.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn collect_wavs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Impossible de lire le dossier {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Analyse every WAV in `dir` in parallel. Results keep the sorted file order.
///
/// # Errors
/// Returns an error if the directory cannot be read or holds no WAV file.
pub fn run_batch(dir: &Path, analyzer: &Analyzer) -> Result<Vec<Analysis>> {
    let files = collect_wavs(dir)?;
    if files.is_empty() {
        anyhow::bail!("Aucun fichier WAV trouvé dans {}", dir.display());
    }
    log::info!("Analyse de {} fichiers dans {}...", files.len(), dir.display());

    let results: Vec<Analysis> = files
        .par_iter()
        .map(|path| analyzer.analyze_path(path))
        .collect();

    let degraded = results
        .iter()
        .filter(|a| a.source != ResultSource::Classifier)
        .count();
    if degraded > 0 {
        log::warn!("{degraded}/{} fichiers analysés en mode dégradé", results.len());
    }
    Ok(results)
}
