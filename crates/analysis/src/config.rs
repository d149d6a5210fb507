use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use tonika_audio::FeatureSettings;
use tonika_domain::{decode_catalog, DataFormat, DomainError, ScaleCatalog};
use tonika_ledger::DEFAULT_LEDGER_FILE;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum fraction of a song's chords a scale must contain to be reported.
    pub match_tolerance: f64,
    /// Allowed gap, in seconds, between mean beat spacing and a meter's expected spacing.
    pub meter_tolerance: f64,
    pub smoothing_window: usize,
    pub ledger_path: PathBuf,
    /// Scale catalog file (JSON or YAML); the built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Window length of the chroma chord detector, in seconds.
    pub chord_window_seconds: f64,
    pub features: FeatureSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            match_tolerance: 0.015,
            meter_tolerance: 0.05,
            smoothing_window: 5,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILE),
            catalog_path: None,
            chord_window_seconds: 0.5,
            features: FeatureSettings::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("read config file {:?}", path))?;
        let config: AnalysisConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config file {:?}", path))?;
        config.validate()?;
        info!(path = ?path, "loaded analysis config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.match_tolerance > 0.0 && self.match_tolerance <= 1.0) {
            return Err(DomainError::validation(
                "match_tolerance must be in (0, 1]",
            ));
        }
        if !(self.meter_tolerance >= 0.0) {
            return Err(DomainError::validation("meter_tolerance cannot be negative"));
        }
        if self.smoothing_window == 0 {
            return Err(DomainError::validation("smoothing_window must be at least 1"));
        }
        if !(self.chord_window_seconds > 0.0) {
            return Err(DomainError::validation(
                "chord_window_seconds must be positive",
            ));
        }
        let features = &self.features;
        if features.hop_size == 0 || features.frame_size < features.hop_size {
            return Err(DomainError::validation(
                "frame_size must be at least hop_size, and hop_size positive",
            ));
        }
        if !(features.min_bpm > 0.0 && features.min_bpm < features.max_bpm) {
            return Err(DomainError::validation(
                "min_bpm must be positive and below max_bpm",
            ));
        }
        if !(features.pitch_fmin > 0.0 && features.pitch_fmin < features.pitch_fmax) {
            return Err(DomainError::validation(
                "pitch_fmin must be positive and below pitch_fmax",
            ));
        }
        Ok(())
    }

    pub fn load_catalog(&self) -> Result<ScaleCatalog> {
        match &self.catalog_path {
            None => Ok(ScaleCatalog::builtin()),
            Some(path) => {
                let bytes =
                    fs::read(path).with_context(|| format!("read scale catalog {:?}", path))?;
                let catalog = decode_catalog(&bytes, DataFormat::from_path(path))
                    .with_context(|| format!("parse scale catalog {:?}", path))?;
                info!(path = ?path, scales = catalog.len(), "loaded scale catalog");
                Ok(catalog)
            }
        }
    }
}
