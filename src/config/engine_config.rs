//! Engine Configuration - language service, retry and forecast tuning as TOML
//!
//! Each section implements `Default` with the values from `config::defaults`,
//! so an absent file or absent keys behave exactly like the built-in tuning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LINECAST_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "linecast.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$LINECAST_CONFIG` env var
/// 2. `./linecast.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Language service connection
    #[serde(default)]
    pub llm: LlmConfig,

    /// Interpretation retry policy
    #[serde(default)]
    pub interpretation: InterpretationConfig,

    /// Forecast aggregation tuning
    #[serde(default)]
    pub forecast: ForecastConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order, falling back to
    /// defaults when a file is missing or invalid.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), model = %config.llm.model, "Loaded engine config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./linecast.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(model = %config.llm.model, "Loaded engine config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Range checks. Collects every problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let llm = &self.llm;
        if llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }
        if llm.timeout_secs == 0 {
            errors.push("llm.timeout_secs must be > 0".to_string());
        }
        if !(0.0..=2.0).contains(&llm.temperature) {
            errors.push(format!(
                "llm.temperature = {:.2} is outside the accepted range (0-2)",
                llm.temperature
            ));
        }
        if llm.max_output_tokens == 0 {
            errors.push("llm.max_output_tokens must be > 0".to_string());
        }

        let interp = &self.interpretation;
        if interp.max_attempts == 0 {
            errors.push("interpretation.max_attempts must be >= 1".to_string());
        }
        if interp.max_backoff_ms < interp.base_backoff_ms {
            errors.push(format!(
                "interpretation.max_backoff_ms ({}) must be >= base_backoff_ms ({})",
                interp.max_backoff_ms, interp.base_backoff_ms
            ));
        }
        if interp.jitter_ms > interp.max_backoff_ms {
            errors.push(format!(
                "interpretation.jitter_ms ({}) must be <= max_backoff_ms ({})",
                interp.jitter_ms, interp.max_backoff_ms
            ));
        }

        let f = &self.forecast;
        if !(f.recency_decay > 0.0 && f.recency_decay <= 1.0) {
            errors.push(format!(
                "forecast.recency_decay = {:.3} must be in (0, 1]",
                f.recency_decay
            ));
        }
        if !(f.prior_strength >= 0.0 && f.prior_strength.is_finite()) {
            errors.push(format!(
                "forecast.prior_strength = {:.3} must be a finite value >= 0",
                f.prior_strength
            ));
        }
        if !(f.interval_level > 0.0 && f.interval_level < 1.0) {
            errors.push(format!(
                "forecast.interval_level = {:.3} must be in (0, 1)",
                f.interval_level
            ));
        }
        if !(f.spread_floor >= 0.0 && f.spread_floor.is_finite()) {
            errors.push(format!(
                "forecast.spread_floor = {:.3} must be a finite value >= 0",
                f.spread_floor
            ));
        }
        if f.summary_excerpt_reports == 0 {
            errors.push("forecast.summary_excerpt_reports must be >= 1".to_string());
        }
        if f.summary_excerpt_chars < 16 {
            errors.push(format!(
                "forecast.summary_excerpt_chars = {} must be >= 16",
                f.summary_excerpt_chars
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Language service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: defaults::LLM_MODEL.to_string(),
            base_url: defaults::LLM_BASE_URL.to_string(),
            api_key_env: defaults::LLM_API_KEY_ENV.to_string(),
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
            temperature: defaults::LLM_TEMPERATURE,
            max_output_tokens: defaults::LLM_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Retry policy for language-service calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretationConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::INTERPRETATION_MAX_ATTEMPTS,
            base_backoff_ms: defaults::INTERPRETATION_BASE_BACKOFF_MS,
            max_backoff_ms: defaults::INTERPRETATION_MAX_BACKOFF_MS,
            jitter_ms: defaults::INTERPRETATION_JITTER_MS,
        }
    }
}

impl InterpretationConfig {
    /// No sleeping between attempts. Used by tests and offline runs.
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter_ms: 0,
        }
    }
}

/// Forecast aggregation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub recency_decay: f64,
    pub prior_strength: f64,
    pub interval_level: f64,
    pub spread_floor: f64,
    pub summary_excerpt_reports: usize,
    pub summary_excerpt_chars: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            recency_decay: defaults::FORECAST_RECENCY_DECAY,
            prior_strength: defaults::FORECAST_PRIOR_STRENGTH,
            interval_level: defaults::FORECAST_INTERVAL_LEVEL,
            spread_floor: defaults::FORECAST_SPREAD_FLOOR,
            summary_excerpt_reports: defaults::SUMMARY_EXCERPT_REPORTS,
            summary_excerpt_chars: defaults::SUMMARY_EXCERPT_CHARS,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}
