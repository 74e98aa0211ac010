use std::path::PathBuf;

use clap::{Parser, Subcommand};
use steth_core::frame::{Category, SignalType};

/// stethoscan : analyse de sons d'auscultation (poumons, cœur).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Sortie JSON au lieu du résumé texte.
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyser un enregistrement WAV.
    Analyze {
        /// Fichier WAV (PCM 16 ou 24 bits).
        path: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Analyser tous les fichiers WAV d'un dossier.
    Batch {
        /// Dossier contenant les enregistrements.
        dir: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Évaluer directement une mesure capteur avec le moteur de règles.
    Score {
        /// Fréquence dominante en Hz (0 = indisponible).
        #[arg(long, default_value_t = 0.0)]
        frequency: f32,

        /// RMS du canal cardiaque.
        #[arg(long, default_value_t = 0.0)]
        heart_rms: f32,

        /// RMS du canal pulmonaire.
        #[arg(long, default_value_t = 0.0)]
        lung_rms: f32,

        /// Canal cardiaque détecté.
        #[arg(long, default_value_t = false)]
        heart: bool,

        /// Canal pulmonaire détecté.
        #[arg(long, default_value_t = false)]
        lung: bool,
    },

    /// Afficher les formes d'entrée/sortie déclarées d'un modèle.
    Inspect {
        /// Définition JSON du modèle.
        model: PathBuf,
    },

    /// Servir un résultat précalculé (mode démo, marqué synthétique).
    Demo {
        /// Catégorie : infectious ou obstructive. Défaut : celle de la config.
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
}

/// Per-run overrides of the config file.
#[derive(clap::Args, Debug)]
pub struct Overrides {
    /// Catégorie : infectious ou obstructive.
    #[arg(long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Modèle JSON (remplace celui de la config).
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Délai d'inférence en secondes.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Canal enregistré pour le repli par règles : lung ou heart.
    #[arg(long, default_value = "lung", value_parser = parse_signal)]
    pub signal: SignalType,
}

fn parse_category(s: &str) -> Result<Category, String> {
    match s.to_ascii_lowercase().as_str() {
        "infectious" => Ok(Category::Infectious),
        "obstructive" => Ok(Category::Obstructive),
        other => Err(format!(
            "catégorie inconnue '{other}' (infectious, obstructive)"
        )),
    }
}

fn parse_signal(s: &str) -> Result<SignalType, String> {
    match s.to_ascii_lowercase().as_str() {
        "lung" => Ok(SignalType::Lung),
        "heart" => Ok(SignalType::Heart),
        other => Err(format!("canal inconnu '{other}' (lung, heart)")),
    }
}
