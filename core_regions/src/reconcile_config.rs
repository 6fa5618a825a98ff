//! Tunable constants for the reconciliation passes.
//!
//! Loaded from `reconcile_config.json`, with `RECONCILE_CONFIG_PATH` as an
//! override and the embedded copy as the last resort.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_RECONCILE_CONFIG: &str = include_str!("data/reconcile_config.json");

const CONFIG_TARGET: &str = "epi_regions::config";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    population: PopulationConfig,
    active_cases: ActiveCaseConfig,
}

impl ReconcileConfig {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_RECONCILE_CONFIG)
            .expect("builtin reconcile config should parse")
    }

    /// Parse and sanitize a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: ReconcileConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn from_file(path: &Path) -> Result<Self, ReconcileConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ReconcileConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ReconcileConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn population(&self) -> &PopulationConfig {
        &self.population
    }

    pub fn active_cases(&self) -> &ActiveCaseConfig {
        &self.active_cases
    }

    pub fn with_confirmed_multiplier(mut self, multiplier: f64) -> Self {
        self.active_cases.confirmed_multiplier = multiplier;
        self.sanitized()
    }

    pub fn with_default_mean_ratio(mut self, ratio: f64) -> Self {
        self.active_cases.default_mean_ratio = ratio;
        self.sanitized()
    }

    pub fn with_min_population(mut self, min_population: u64) -> Self {
        self.population.min_population = min_population;
        self.sanitized()
    }

    pub fn with_inconsistency_tolerance(mut self, tolerance: f64) -> Self {
        self.population.inconsistency_tolerance = tolerance;
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        let defaults = ReconcileConfig::default();
        let multiplier = self.active_cases.confirmed_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            tracing::warn!(
                target: CONFIG_TARGET,
                multiplier,
                "reconcile_config.confirmed_multiplier_clamped=1.0"
            );
            self.active_cases.confirmed_multiplier = 1.0;
        }
        let ratio = self.active_cases.default_mean_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            tracing::warn!(
                target: CONFIG_TARGET,
                ratio,
                "reconcile_config.default_mean_ratio_reset"
            );
            self.active_cases.default_mean_ratio = defaults.active_cases.default_mean_ratio;
        }
        let tolerance = self.population.inconsistency_tolerance;
        if !tolerance.is_finite() || tolerance < 1.0 {
            tracing::warn!(
                target: CONFIG_TARGET,
                tolerance,
                "reconcile_config.inconsistency_tolerance_reset"
            );
            self.population.inconsistency_tolerance = defaults.population.inconsistency_tolerance;
        }
        if self.population.min_population == 0 {
            tracing::warn!(
                target: CONFIG_TARGET,
                "reconcile_config.min_population_clamped=1"
            );
            self.population.min_population = 1;
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum ReconcileConfigError {
    #[error("failed to parse reconcile config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read reconcile config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    inconsistency_tolerance: f64,
    min_population: u64,
}

impl PopulationConfig {
    /// Children may add up to this multiple of the parent before a warning.
    pub fn inconsistency_tolerance(&self) -> f64 {
        self.inconsistency_tolerance
    }

    /// Hard floor applied to every area by the bottom-up pass.
    pub fn min_population(&self) -> u64 {
        self.min_population
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            inconsistency_tolerance: 1.3,
            min_population: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActiveCaseConfig {
    default_mean_ratio: f64,
    confirmed_multiplier: f64,
}

impl ActiveCaseConfig {
    /// Confirmed-to-population ratio assumed when no sibling has one.
    pub fn default_mean_ratio(&self) -> f64 {
        self.default_mean_ratio
    }

    /// Final active estimates are at least this multiple of confirmed active cases.
    pub fn confirmed_multiplier(&self) -> f64 {
        self.confirmed_multiplier
    }
}

impl Default for ActiveCaseConfig {
    fn default() -> Self {
        Self {
            default_mean_ratio: 0.01,
            confirmed_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfigMetadata {
    path: Option<PathBuf>,
}

impl ReconcileConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Config from `RECONCILE_CONFIG_PATH`, else the crate's
/// `src/data/reconcile_config.json`, else the embedded copy when the file
/// cannot be read or parsed.
pub fn load_reconcile_config_from_env() -> (ReconcileConfig, ReconcileConfigMetadata) {
    let path = env::var_os("RECONCILE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/reconcile_config.json")
        });

    match ReconcileConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: CONFIG_TARGET,
                path = %path.display(),
                "reconcile_config.loaded=file"
            );
            (config, ReconcileConfigMetadata::new(Some(path)))
        }
        Err(err) => {
            tracing::warn!(
                target: CONFIG_TARGET,
                path = %path.display(),
                error = %err,
                "reconcile_config.loaded=builtin"
            );
            (ReconcileConfig::builtin(), ReconcileConfigMetadata::new(None))
        }
    }
}
