use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use steth_classify::DenseModel;
use steth_classify::demo::DemoLibrary;
use steth_core::config::PipelineConfig;
use steth_core::frame::{Category, SensorReading};
use steth_core::traits::ScoringModel;

pub mod batch;
pub mod cli;
pub mod pipeline;

use cli::{Command, Overrides};
use pipeline::{Analysis, Analyzer, ResultSource};

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config
    let config = resolve_config(&cli.config)?;

    // 4. Dispatcher
    match cli.command {
        Command::Analyze { path, overrides } => {
            let signal = overrides.signal;
            let analyzer = Analyzer::new(apply_overrides(config, overrides), signal);
            let analysis = analyzer.analyze_path(&path);
            emit(&analysis, cli.json, pipeline::render_text)
        }
        Command::Batch { dir, overrides } => {
            let signal = overrides.signal;
            let analyzer = Analyzer::new(apply_overrides(config, overrides), signal);
            let results = batch::run_batch(&dir, &analyzer)?;
            if cli.json {
                println!("{}", pipeline::render_json(&results)?);
            } else {
                for analysis in &results {
                    print!("{}", pipeline::render_text(analysis));
                }
            }
            Ok(())
        }
        Command::Score {
            frequency,
            heart_rms,
            lung_rms,
            heart,
            lung,
        } => {
            let diagnosis = steth_risk::evaluate(&SensorReading {
                frequency,
                heart_rms,
                lung_rms,
                heart_detected: heart,
                lung_detected: lung,
            });
            emit(&diagnosis, cli.json, pipeline::render_diagnosis)
        }
        Command::Inspect { model } => inspect(&model, cli.json),
        Command::Demo { category } => {
            let category = category.unwrap_or(config.category);
            let analysis = run_demo(&config, category)?;
            emit(&analysis, cli.json, pipeline::render_text)
        }
    }
}

/// Print `value` as JSON or through `text`.
fn emit<T: Serialize>(value: &T, json: bool, text: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", pipeline::render_json(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

/// Missing file ⇒ defaults with a warning; unreadable or invalid file ⇒ error.
fn resolve_config(path: &Path) -> Result<PipelineConfig> {
    if path.exists() {
        steth_core::config::load_config(path)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            path.display()
        );
        Ok(PipelineConfig::default())
    }
}

fn apply_overrides(mut config: PipelineConfig, overrides: Overrides) -> PipelineConfig {
    if let Some(category) = overrides.category {
        config.category = category;
    }
    if overrides.model.is_some() {
        config.model = overrides.model;
    }
    if let Some(timeout) = overrides.timeout {
        config.timeout_secs = timeout;
    }
    config.clamp_all();
    config
}

#[derive(Serialize)]
struct ModelSummary<'a> {
    name: &'a str,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    categories: Vec<Category>,
}

/// Print a model's declared shapes and the categories it can serve.
fn inspect(path: &Path, json: bool) -> Result<()> {
    let model = DenseModel::load(path)?;
    let (input_shape, output_shape) = model.describe();
    let summary = ModelSummary {
        name: model.name(),
        input_shape,
        output_shape,
        categories: [Category::Infectious, Category::Obstructive]
            .into_iter()
            .filter(|c| c.num_classes() == model.num_classes())
            .collect(),
    };
    emit(&summary, json, |s| {
        format!(
            "{}\n  entrée : {:?}\n  sortie : {:?}\n  catégories : {:?}\n",
            s.name, s.input_shape, s.output_shape, s.categories
        )
    })
}

fn run_demo(config: &PipelineConfig, category: Category) -> Result<Analysis> {
    let path = config
        .demo_library
        .as_deref()
        .context("Aucune bibliothèque démo configurée ([analysis] demo_library)")?;
    let library = DemoLibrary::load(path)?;
    let (asset, classification) = library
        .sample(category, &mut rand::rng())
        .with_context(|| format!("Aucun résultat démo pour {category:?}"))?;
    Ok(Analysis {
        file: asset,
        source: ResultSource::Demo,
        classification: Some(classification),
        diagnosis: None,
        fallback_reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use steth_core::frame::SignalType;

    #[test]
    fn overrides_replace_config_and_clamp() {
        let overrides = Overrides {
            category: Some(Category::Obstructive),
            model: Some(PathBuf::from("m.json")),
            timeout: Some(600),
            signal: SignalType::Lung,
        };
        let config = apply_overrides(PipelineConfig::default(), overrides);
        assert_eq!(config.category, Category::Obstructive);
        assert_eq!(config.model, Some(PathBuf::from("m.json")));
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let config = resolve_config(Path::new("/nonexistent/stethoscan.toml"))?;
        assert_eq!(config.timeout_secs, 15);
        Ok(())
    }

    #[test]
    fn shipped_config_and_assets_load() -> Result<()> {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
        let config = resolve_config(&root.join("default.toml"))?;
        assert_eq!(config.category, Category::Infectious);
        let analysis = run_demo(&config, Category::Obstructive)?;
        assert!(analysis.file.ends_with(".wav"));

        let model = DenseModel::load(&root.join("models/minimal.json"))?;
        assert_eq!(model.describe(), (vec![1, 32_000, 1], vec![1, 3]));
        Ok(())
    }

    #[test]
    fn demo_requires_a_library() {
        assert!(run_demo(&PipelineConfig::default(), Category::Infectious).is_err());
    }

    #[test]
    fn demo_results_are_synthetic() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("demo.json");
        std::fs::write(
            &path,
            r#"{ "entries": [ { "asset": "copd_01.wav", "category": "obstructive", "probabilities": [0.1, 0.8, 0.1] } ] }"#,
        )?;
        let config = PipelineConfig {
            demo_library: Some(path),
            ..PipelineConfig::default()
        };
        let analysis = run_demo(&config, Category::Obstructive)?;
        assert_eq!(analysis.source, ResultSource::Demo);
        assert!(analysis.classification.is_some_and(|c| c.synthetic));
        Ok(())
    }
}
