//! Engine-wide default constants.
//!
//! Every tunable in `EngineConfig` falls back to one of these values.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Language Service
// ============================================================================

/// Default hosted model for interpretation and summarization.
pub const LLM_MODEL: &str = "gemini-2.5-flash-lite";

/// Default REST endpoint root for the Gemini API.
pub const LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key.
pub const LLM_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Maximum time to wait for a single completion before aborting (seconds).
pub const LLM_TIMEOUT_SECS: u64 = 30;

/// Sampling temperature. Kept low so structured output stays stable.
pub const LLM_TEMPERATURE: f64 = 0.2;

/// Upper bound on generated tokens per completion.
pub const LLM_MAX_OUTPUT_TOKENS: u32 = 512;

// ============================================================================
// Interpretation Retry
// ============================================================================

/// Total attempts (first call included) for transient service failures.
pub const INTERPRETATION_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry (ms). Doubles per further attempt.
pub const INTERPRETATION_BASE_BACKOFF_MS: u64 = 250;

/// Ceiling for a single backoff sleep (ms).
pub const INTERPRETATION_MAX_BACKOFF_MS: u64 = 4_000;

/// Upper bound of the random jitter added to each backoff (ms).
pub const INTERPRETATION_JITTER_MS: u64 = 100;

/// Maximum backoff multiplier exponent.
///
/// `2^5 = 32×` base backoff before the ceiling applies.
pub const RETRY_MAX_BACKOFF_EXPONENT: u32 = 5;

// ============================================================================
// Forecast
// ============================================================================

/// Weight multiplier applied per step back in report history.
pub const FORECAST_RECENCY_DECAY: f64 = 0.75;

/// Pseudo-weight of the historical prior, in units of one fully
/// confident, most recent report.
pub const FORECAST_PRIOR_STRENGTH: f64 = 1.0;

/// Two-sided coverage of the reported wait interval.
pub const FORECAST_INTERVAL_LEVEL: f64 = 0.8;

/// Interval spread as a fraction of the estimate, added to the report
/// standard deviation so a single report still yields a non-zero width.
pub const FORECAST_SPREAD_FLOOR: f64 = 0.15;

/// Floor on `n * mean_confidence` in the interval denominator.
pub const FORECAST_MIN_EVIDENCE: f64 = 0.1;

/// Number of most recent raw reports quoted in the summary prompt.
pub const SUMMARY_EXCERPT_REPORTS: usize = 3;

/// Characters kept from each quoted report.
pub const SUMMARY_EXCERPT_CHARS: usize = 160;

// ============================================================================
// Interpretation Bounds
// ============================================================================

/// Largest people count accepted from the language service.
pub const MAX_PEOPLE_IN_LINE: f64 = 100_000.0;

/// Largest wait accepted from the language service (one week, minutes).
pub const MAX_WAIT_MINS: f64 = 10_080.0;
