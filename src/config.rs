use crate::MoralignError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "moralign.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MoralignConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub morality: MoralityConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Fixed per-stage file locations. CLI path flags override these.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_cleaned")]
    pub cleaned: PathBuf,
    #[serde(default = "default_morality")]
    pub morality: PathBuf,
    #[serde(default = "default_alignment")]
    pub alignment: PathBuf,
    #[serde(default = "default_report")]
    pub report: PathBuf,
    #[serde(default = "default_sentiment")]
    pub sentiment: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            cleaned: default_cleaned(),
            morality: default_morality(),
            alignment: default_alignment(),
            report: default_report(),
            sentiment: default_sentiment(),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_cleaned() -> PathBuf {
    PathBuf::from("data/cleaned/cleaned_conversations.json")
}

fn default_morality() -> PathBuf {
    PathBuf::from("data/processed/morality_scores.json")
}

fn default_alignment() -> PathBuf {
    PathBuf::from("data/processed/alignment_features.json")
}

fn default_report() -> PathBuf {
    PathBuf::from("data/reports/report.md")
}

fn default_sentiment() -> PathBuf {
    PathBuf::from("data/reports/sentiment_scores.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LanguageConfig {
    /// ISO 639-3 codes the detector chooses between. Must include "eng".
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Detections closer than this to the runner-up count as failures.
    #[serde(default = "default_min_relative_distance")]
    pub min_relative_distance: f64,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            min_relative_distance: default_min_relative_distance(),
        }
    }
}

fn default_languages() -> Vec<String> {
    [
        "eng", "spa", "fra", "deu", "ita", "por", "nld", "rus", "pol", "tur", "ara", "hin",
        "zho", "jpn", "kor", "vie", "ind",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_min_relative_distance() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScorerBackend {
    #[default]
    Linear,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MoralityConfig {
    #[serde(default)]
    pub backend: ScorerBackend,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Texts longer than this (in chars) are recorded as scoring failures.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Worker threads for scoring; 0 lets rayon decide.
    #[serde(default)]
    pub threads: usize,
}

impl Default for MoralityConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::default(),
            model_path: default_model_path(),
            endpoint: None,
            timeout_secs: default_timeout(),
            max_input_chars: default_max_input_chars(),
            threads: 0,
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/moral-foundations.json")
}

fn default_timeout() -> u64 {
    30
}

fn default_max_input_chars() -> usize {
    2048
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Null-hypothesis location for every moral foundation.
    #[serde(default = "default_reference")]
    pub reference: f64,
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    #[serde(default = "default_top_words")]
    pub top_words: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            reference: default_reference(),
            histogram_bins: default_histogram_bins(),
            top_words: default_top_words(),
        }
    }
}

fn default_reference() -> f64 {
    0.5
}

fn default_histogram_bins() -> usize {
    30
}

fn default_top_words() -> usize {
    40
}

/// Load config from an explicit path, ./moralign.toml, or defaults.
/// An explicit path that does not exist is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<MoralignConfig, MoralignError> {
    let path = match explicit {
        Some(p) if !p.exists() => {
            return Err(MoralignError::Config(format!(
                "{}: no such file",
                p.display()
            )));
        }
        Some(p) => Some(p.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };

    match path {
        Some(p) => {
            let content = std::fs::read_to_string(&p)?;
            let config = parse_config(&content)
                .map_err(|e| MoralignError::Config(format!("{}: {e}", p.display())))?;
            log::debug!("loaded config from {}", p.display());
            Ok(config)
        }
        None => Ok(MoralignConfig::default()),
    }
}

fn parse_config(content: &str) -> Result<MoralignConfig, String> {
    let config: MoralignConfig = toml::from_str(content).map_err(|e| e.to_string())?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &MoralignConfig) -> Result<(), String> {
    let languages = &config.language.languages;
    if languages.len() < 2 {
        return Err("language.languages needs at least two languages".into());
    }
    if !languages.iter().any(|l| l == "eng") {
        return Err("language.languages must include \"eng\"".into());
    }
    let distance = config.language.min_relative_distance;
    if !(0.0..=0.99).contains(&distance) {
        return Err(format!(
            "language.min_relative_distance must be within [0, 0.99], got {distance}"
        ));
    }
    let reference = config.report.reference;
    if !(0.0..=1.0).contains(&reference) {
        return Err(format!("report.reference must be within [0, 1], got {reference}"));
    }
    if config.report.histogram_bins == 0 {
        return Err("report.histogram_bins must be positive".into());
    }
    if config.morality.max_input_chars == 0 {
        return Err("morality.max_input_chars must be positive".into());
    }
    if config.morality.backend == ScorerBackend::Http
        && config.morality.endpoint.as_deref().is_none_or(|e| e.trim().is_empty())
    {
        return Err("morality.endpoint is required for the http backend".into());
    }
    Ok(())
}
