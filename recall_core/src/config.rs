//! Configuration file support for Recall.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/recall/config.toml`.
//! Every field has a default, so a partial file only overrides what it names.

use crate::scheduler::MAX_STABILITY;
use crate::{Error, Result, MAX_DIFFICULTY, MIN_DIFFICULTY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest daily card limit the settings layer accepts
pub const MIN_CARDS_PER_DAY: u32 = 5;

/// Largest daily card limit the settings layer accepts
pub const MAX_CARDS_PER_DAY: u32 = 500;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub study: StudyConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Scheduler tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Recall probability the scheduler aims for when a card comes due
    #[serde(default = "default_request_retention")]
    pub request_retention: f64,

    #[serde(default = "default_learning_steps")]
    pub learning_steps_minutes: Vec<u32>,

    #[serde(default = "default_relearning_steps")]
    pub relearning_steps_minutes: Vec<u32>,

    #[serde(default = "default_min_interval_days")]
    pub min_interval_days: f64,

    #[serde(default = "default_max_interval_days")]
    pub max_interval_days: f64,

    #[serde(default)]
    pub weights: SchedulerWeights,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_retention: default_request_retention(),
            learning_steps_minutes: default_learning_steps(),
            relearning_steps_minutes: default_relearning_steps(),
            min_interval_days: default_min_interval_days(),
            max_interval_days: default_max_interval_days(),
            weights: SchedulerWeights::default(),
        }
    }
}

/// Constants of the difficulty/stability update formulas.
///
/// The defaults are in the range published for FSRS-style schedulers; they are
/// starting points, not fitted values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerWeights {
    /// Stability seeded by the first rating, indexed Again..Easy
    pub initial_stability: [f64; 4],
    pub initial_difficulty: f64,
    /// Difficulty shift per rating step away from Good on the first rating
    pub difficulty_rating_step: f64,
    /// Difficulty shift per rating step away from Good in review
    pub difficulty_delta: f64,
    pub growth_factor: f64,
    pub stability_decay: f64,
    pub retrievability_gain: f64,
    pub hard_penalty: f64,
    pub easy_bonus: f64,
    pub forget_base: f64,
    pub forget_difficulty: f64,
    pub forget_stability: f64,
    pub forget_retrievability: f64,
    pub short_term_factor: f64,
    pub short_term_offset: f64,
}

impl Default for SchedulerWeights {
    fn default() -> Self {
        Self {
            initial_stability: [0.4, 0.9, 2.3, 5.8],
            initial_difficulty: 5.0,
            difficulty_rating_step: 1.0,
            difficulty_delta: 0.86,
            growth_factor: 1.49,
            stability_decay: 0.14,
            retrievability_gain: 0.94,
            hard_penalty: 0.3,
            easy_bonus: 2.6,
            forget_base: 2.18,
            forget_difficulty: 0.05,
            forget_stability: 0.34,
            forget_retrievability: 1.26,
            short_term_factor: 0.5,
            short_term_offset: 0.6,
        }
    }
}

/// Study session configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_max_cards_per_day")]
    pub max_cards_per_day: u32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            max_cards_per_day: default_max_cards_per_day(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("recall")
}

fn default_request_retention() -> f64 {
    0.9
}

fn default_learning_steps() -> Vec<u32> {
    vec![1, 10]
}

fn default_relearning_steps() -> Vec<u32> {
    vec![10]
}

fn default_min_interval_days() -> f64 {
    1.0
}

fn default_max_interval_days() -> f64 {
    36500.0
}

fn default_max_cards_per_day() -> u32 {
    50
}

fn validate_steps(name: &str, steps: &[u32]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", name)));
    }
    if steps.iter().any(|&m| m == 0) {
        return Err(Error::Config(format!("{} must all be positive", name)));
    }
    if steps.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::Config(format!("{} must be non-decreasing", name)));
    }
    Ok(())
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return Err(Error::Config(format!(
                "request_retention must be in (0, 1), got {}",
                self.request_retention
            )));
        }

        validate_steps("learning_steps_minutes", &self.learning_steps_minutes)?;
        validate_steps("relearning_steps_minutes", &self.relearning_steps_minutes)?;

        if !(self.min_interval_days > 0.0) {
            return Err(Error::Config(format!(
                "min_interval_days must be positive, got {}",
                self.min_interval_days
            )));
        }
        if !(self.max_interval_days >= self.min_interval_days) {
            return Err(Error::Config(format!(
                "max_interval_days ({}) is below min_interval_days ({})",
                self.max_interval_days, self.min_interval_days
            )));
        }
        if self.max_interval_days > MAX_STABILITY {
            return Err(Error::Config(format!(
                "max_interval_days must be at most {}, got {}",
                MAX_STABILITY, self.max_interval_days
            )));
        }

        self.weights.validate()
    }
}

impl SchedulerWeights {
    pub fn validate(&self) -> Result<()> {
        let w = self;
        let named = [
            ("initial_difficulty", w.initial_difficulty),
            ("difficulty_rating_step", w.difficulty_rating_step),
            ("difficulty_delta", w.difficulty_delta),
            ("growth_factor", w.growth_factor),
            ("stability_decay", w.stability_decay),
            ("retrievability_gain", w.retrievability_gain),
            ("hard_penalty", w.hard_penalty),
            ("easy_bonus", w.easy_bonus),
            ("forget_base", w.forget_base),
            ("forget_difficulty", w.forget_difficulty),
            ("forget_stability", w.forget_stability),
            ("forget_retrievability", w.forget_retrievability),
            ("short_term_factor", w.short_term_factor),
            ("short_term_offset", w.short_term_offset),
        ];
        if let Some((name, value)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Config(format!("weight {} must be finite, got {}", name, value)));
        }

        if w.initial_stability.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::Config("initial_stability values must be positive".into()));
        }

        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&w.initial_difficulty) {
            return Err(Error::Config(format!(
                "initial_difficulty must be between {} and {}, got {}",
                MIN_DIFFICULTY, MAX_DIFFICULTY, w.initial_difficulty
            )));
        }

        // Negative values here would flip the direction a rating moves a card
        let non_negative = [
            ("difficulty_rating_step", w.difficulty_rating_step),
            ("difficulty_delta", w.difficulty_delta),
            ("hard_penalty", w.hard_penalty),
            ("easy_bonus", w.easy_bonus),
            ("forget_base", w.forget_base),
            ("forget_difficulty", w.forget_difficulty),
            ("forget_stability", w.forget_stability),
            ("forget_retrievability", w.forget_retrievability),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, v)| *v < 0.0) {
            return Err(Error::Config(format!("weight {} must not be negative, got {}", name, value)));
        }

        Ok(())
    }
}

impl StudyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CARDS_PER_DAY..=MAX_CARDS_PER_DAY).contains(&self.max_cards_per_day) {
            return Err(Error::Config(format!(
                "max_cards_per_day must be between {} and {}, got {}",
                MIN_CARDS_PER_DAY, MAX_CARDS_PER_DAY, self.max_cards_per_day
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.study.validate()
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("recall").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.request_retention, 0.9);
        assert_eq!(config.scheduler.learning_steps_minutes, vec![1, 10]);
        assert_eq!(config.scheduler.relearning_steps_minutes, vec![10]);
        assert_eq!(config.scheduler.min_interval_days, 1.0);
        assert_eq!(config.scheduler.max_interval_days, 36500.0);
        assert_eq!(config.study.max_cards_per_day, 50);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.scheduler.learning_steps_minutes,
            parsed.scheduler.learning_steps_minutes
        );
        assert_eq!(config.scheduler.weights, parsed.scheduler.weights);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scheduler]
request_retention = 0.85

[scheduler.weights]
easy_bonus = 3.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.request_retention, 0.85);
        assert_eq!(config.scheduler.learning_steps_minutes, vec![1, 10]); // default
        assert_eq!(config.scheduler.weights.easy_bonus, 3.0);
        assert_eq!(config.scheduler.weights.hard_penalty, 0.3); // default
        assert_eq!(config.study.max_cards_per_day, 50);
    }

    #[test]
    fn test_rejects_bad_retention() {
        let mut config = SchedulerConfig::default();
        config.request_retention = 1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.request_retention = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_steps() {
        let mut config = SchedulerConfig::default();
        config.learning_steps_minutes = vec![];
        assert!(config.validate().is_err());

        config.learning_steps_minutes = vec![10, 1];
        assert!(config.validate().is_err());

        config.learning_steps_minutes = vec![1, 10];
        config.relearning_steps_minutes = vec![0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_interval_bounds() {
        let mut config = SchedulerConfig::default();
        config.min_interval_days = 30.0;
        config.max_interval_days = 7.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_interval_beyond_stability_ceiling() {
        let mut config = SchedulerConfig::default();
        config.min_interval_days = 1e9;
        config.max_interval_days = 1e9;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.min_interval_days = 1.0;
        config.max_interval_days = f64::INFINITY;
        assert!(config.validate().is_err());

        config.max_interval_days = MAX_STABILITY;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_difficulty_delta() {
        let mut config = SchedulerConfig::default();
        config.weights.difficulty_delta = -2.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_non_finite_weights() {
        let toml_str = r#"
[scheduler.weights]
short_term_factor = nan
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.scheduler.weights.short_term_factor.is_nan());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut weights = SchedulerWeights::default();
        weights.initial_difficulty = f64::NAN;
        assert!(weights.validate().is_err());
        weights.initial_difficulty = 5.0;
        weights.growth_factor = f64::INFINITY;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_weights() {
        let mut weights = SchedulerWeights::default();
        weights.initial_difficulty = 11.0;
        assert!(weights.validate().is_err());

        let mut weights = SchedulerWeights::default();
        weights.easy_bonus = -0.5;
        assert!(weights.validate().is_err());

        let mut weights = SchedulerWeights::default();
        weights.forget_retrievability = -1.0;
        assert!(weights.validate().is_err());

        assert!(SchedulerWeights::default().validate().is_ok());
    }

    #[test]
    fn test_daily_limit_range() {
        let mut study = StudyConfig::default();
        study.max_cards_per_day = MIN_CARDS_PER_DAY;
        assert!(study.validate().is_ok());
        study.max_cards_per_day = MAX_CARDS_PER_DAY;
        assert!(study.validate().is_ok());
        study.max_cards_per_day = 4;
        assert!(study.validate().is_err());
        study.max_cards_per_day = 501;
        assert!(study.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[study]\nmax_cards_per_day = 1000\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.study.max_cards_per_day = 120;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.study.max_cards_per_day, 120);
    }
}
