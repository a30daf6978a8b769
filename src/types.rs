//! Shared data structures for queue wait forecasting
//!
//! This module defines the core types flowing through the engine:
//! - Queue identity and its historical baseline (creation-time priors)
//! - Reports: raw bystander text plus an optional interpretation
//! - Interpretation: the validated numeric/categorical reading of a report
//! - Forecast: the derived wait-time / entry estimate for a queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Caller-chosen queue identifier, unique across the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QueueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Engine-generated report identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(Uuid);

impl ReportId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Queue Baseline
// ============================================================================

/// Historical priors supplied when a queue is created. Immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBaseline {
    pub hist_avg_wait_mins: f64,
    pub hist_avg_people_in_line: f64,
}

// ============================================================================
// Interpretation Categories
// ============================================================================

/// How quickly the line is moving, as read from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementRate {
    Stalled,
    Slow,
    Steady,
    Fast,
}

impl MovementRate {
    pub const ALL: [Self; 4] = [Self::Stalled, Self::Slow, Self::Steady, Self::Fast];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementRate::Stalled => "stalled",
            MovementRate::Slow => "slow",
            MovementRate::Steady => "steady",
            MovementRate::Fast => "fast",
        }
    }

    /// Strict parse of a normalized label (see `normalize_label`).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == label)
    }
}

impl std::fmt::Display for MovementRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the observer expects people at their position to get in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryOutcome {
    LikelyEnter,
    Uncertain,
    LikelyRejected,
}

impl EntryOutcome {
    pub const ALL: [Self; 3] = [Self::LikelyEnter, Self::Uncertain, Self::LikelyRejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryOutcome::LikelyEnter => "likely-enter",
            EntryOutcome::Uncertain => "uncertain",
            EntryOutcome::LikelyRejected => "likely-rejected",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == label)
    }

    /// Probability mass this outcome contributes to the entry estimate.
    pub fn entry_score(&self) -> f64 {
        match self {
            EntryOutcome::LikelyEnter => 1.0,
            EntryOutcome::Uncertain => 0.5,
            EntryOutcome::LikelyRejected => 0.0,
        }
    }
}

impl std::fmt::Display for EntryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, trim and fold `_` / whitespace into `-` so that
/// "Likely_Enter" and "likely enter" both read as "likely-enter".
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Reports
// ============================================================================

/// Validated reading of one report. Constructed only by the response parser,
/// so every instance is within its declared domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub est_ppl_in_line: u32,
    pub estimated_wait_mins: f64,
    pub movement_rate: MovementRate,
    pub entry_outcome: EntryOutcome,
    pub ai_confidence: f64,
    pub interpreted_at: DateTime<Utc>,
}

/// A bystander report. The interpreted fields live in a single `Option` so
/// they are either all absent or all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub queue_id: QueueId,
    pub raw_text: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    /// Template variant of the latest successful interpretation (0 before).
    pub variant: u32,
    pub interpretation: Option<Interpretation>,
}

impl Report {
    pub fn is_interpreted(&self) -> bool {
        self.interpretation.is_some()
    }

    pub fn est_ppl_in_line(&self) -> Option<u32> {
        self.interpretation.as_ref().map(|i| i.est_ppl_in_line)
    }

    pub fn estimated_wait_mins(&self) -> Option<f64> {
        self.interpretation.as_ref().map(|i| i.estimated_wait_mins)
    }

    pub fn movement_rate(&self) -> Option<MovementRate> {
        self.interpretation.as_ref().map(|i| i.movement_rate)
    }

    pub fn entry_outcome(&self) -> Option<EntryOutcome> {
        self.interpretation.as_ref().map(|i| i.entry_outcome)
    }

    pub fn ai_confidence(&self) -> Option<f64> {
        self.interpretation.as_ref().map(|i| i.ai_confidence)
    }
}

// ============================================================================
// Forecast
// ============================================================================

/// Closed range of minutes, `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinutesRange {
    pub low: f64,
    pub high: f64,
}

impl MinutesRange {
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

impl std::fmt::Display for MinutesRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}-{:.0} min", self.low, self.high)
    }
}

/// Derived forecast for one queue. Recomputed on every prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub queue_id: QueueId,
    pub est_wait_time_mins: f64,
    pub entry_probability: f64,
    pub confidence_interval_mins: MinutesRange,
    pub est_people_in_line: f64,
    pub dominant_movement: Option<MovementRate>,
    pub interpreted_report_count: usize,
    /// Total recency-and-confidence weight of the contributing reports.
    pub report_weight: f64,
    /// Fraction of the wait estimate carried by the historical prior.
    pub prior_share: f64,
    /// Only set by summarization, never by the numeric prediction.
    pub ai_summary: Option<String>,
}
