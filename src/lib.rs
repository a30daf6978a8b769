//! Linecast: Queue Wait Prediction Engine
//!
//! Turns free-text bystander reports about a physical queue into a wait-time
//! and entry-probability forecast.
//!
//! ## Architecture
//!
//! - **Report Store**: per-queue historical baseline plus ordered reports
//! - **Interpretation Step**: language-service call with strict response
//!   validation and bounded retry
//! - **Forecast Step**: deterministic, recency and confidence weighted
//!   aggregation, with an optional prose summary
//! - **Engine Facade**: `PredictionEngine`, the only mutation path

pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod interpretation;
pub mod llm;
pub mod store;
pub mod types;

// Re-export the engine surface
pub use engine::PredictionEngine;
pub use error::{EngineError, EngineResult};

// Re-export configuration
pub use config::{ConfigError, EngineConfig, ForecastConfig, InterpretationConfig, LlmConfig};

// Re-export commonly used types
pub use types::{
    EntryOutcome, Forecast, HistoricalBaseline, Interpretation, MinutesRange, MovementRate,
    QueueId, Report, ReportId,
};

// Re-export language-service components
pub use interpretation::{FormatError, InterpretationVariant, InterpreterStats};
pub use llm::{GeminiBackend, LlmBackend, ScriptedBackend, ServiceError};
