//! Interpretation Step - language-service oracle with strict validation
//!
//! Turns one raw report into a validated `Interpretation`, and carries the
//! sibling summarization call used by the forecast step.
//!
//! ## Retry Policy
//!
//! - Transient `ServiceError`s (transport, timeout, rate limit, 5xx) are
//!   retried up to `max_attempts` with exponential backoff plus jitter
//! - Permanent service errors (auth, 4xx) fail on the first attempt
//! - Format errors are a data-quality failure and are never retried

pub mod parsing;
pub mod templates;

pub use parsing::{parse_interpretation, FormatError};
pub use templates::{build_interpretation_prompt, InterpretationVariant};

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::defaults::RETRY_MAX_BACKOFF_EXPONENT;
use crate::config::InterpretationConfig;
use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmBackend, ServiceError};
use crate::types::{HistoricalBaseline, Interpretation};

/// What a language-service call is for, used in logs and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Interpretation,
    Summary,
}

impl std::fmt::Display for CallPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallPurpose::Interpretation => write!(f, "interpretation"),
            CallPurpose::Summary => write!(f, "summary"),
        }
    }
}

/// Running counters for oracle calls
#[derive(Debug, Default)]
struct InterpreterCounters {
    interpretations: u64,
    interpreted_ok: u64,
    format_failures: u64,
    service_failures: u64,
    retries: u64,
    summaries: u64,
    total_latency_ms: f64,
    completions: u64,
}

/// Snapshot of interpreter statistics
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterStats {
    pub interpretations: u64,
    pub interpreted_ok: u64,
    pub format_failures: u64,
    pub service_failures: u64,
    pub retries: u64,
    pub summaries: u64,
    pub avg_latency_ms: f64,
}

impl std::fmt::Display for InterpreterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Interpreter: {} interpretations ({} ok, {} format failures, {} service failures), {} summaries, {} retries, {:.1}ms avg",
            self.interpretations,
            self.interpreted_ok,
            self.format_failures,
            self.service_failures,
            self.summaries,
            self.retries,
            self.avg_latency_ms
        )
    }
}

/// Oracle wrapper: prompt building, bounded retry and response validation
pub struct Interpreter {
    backend: Arc<dyn LlmBackend>,
    retry: InterpretationConfig,
    stats: Mutex<InterpreterCounters>,
}

impl Interpreter {
    pub fn new(backend: Arc<dyn LlmBackend>, retry: InterpretationConfig) -> Self {
        Self {
            backend,
            retry,
            stats: Mutex::new(InterpreterCounters::default()),
        }
    }

    /// Interpret one report. Nothing is written anywhere; the caller commits
    /// the returned value.
    pub async fn interpret(
        &self,
        raw_text: &str,
        baseline: &HistoricalBaseline,
        variant: InterpretationVariant,
    ) -> EngineResult<Interpretation> {
        let prompt = build_interpretation_prompt(variant, baseline, raw_text);
        debug!(
            variant = variant.name(),
            prompt_chars = prompt.len(),
            "Built interpretation prompt"
        );

        self.stats.lock().await.interpretations += 1;

        let response = match self.complete(&prompt, CallPurpose::Interpretation).await {
            Ok(text) => text,
            Err(e) => {
                self.stats.lock().await.service_failures += 1;
                return Err(EngineError::Service(e));
            }
        };

        match parse_interpretation(&response, Utc::now()) {
            Ok(interpretation) => {
                self.stats.lock().await.interpreted_ok += 1;
                Ok(interpretation)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    variant = variant.name(),
                    response_chars = response.len(),
                    "Rejected interpretation response"
                );
                self.stats.lock().await.format_failures += 1;
                Err(EngineError::InterpretationFormat(e))
            }
        }
    }

    /// Ask the language service to phrase a prepared summary prompt.
    /// Empty output counts as failure.
    pub async fn summarize(&self, prompt: &str) -> EngineResult<String> {
        self.stats.lock().await.summaries += 1;

        let text = self
            .complete(prompt, CallPurpose::Summary)
            .await
            .map_err(|e| {
                warn!(error = %e, "Summary call failed");
                EngineError::Summarization(e.to_string())
            })?;

        let cleaned = clean_summary(&text);
        if cleaned.is_empty() {
            warn!("Summary call returned empty text");
            return Err(EngineError::Summarization(
                "language service returned empty text".to_string(),
            ));
        }
        Ok(cleaned)
    }

    /// One logical completion with bounded retry on transient failures.
    async fn complete(&self, prompt: &str, purpose: CallPurpose) -> Result<String, ServiceError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            let start = Instant::now();
            let result = self.backend.complete(prompt).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            {
                let mut stats = self.stats.lock().await;
                stats.completions += 1;
                stats.total_latency_ms += elapsed_ms;
            }

            match result {
                Ok(text) => {
                    debug!(
                        backend = self.backend.backend_name(),
                        %purpose,
                        attempt,
                        latency_ms = elapsed_ms,
                        "Language service call succeeded"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        error = %e,
                        %purpose,
                        attempt,
                        max_attempts,
                        next_retry_ms = backoff.as_millis() as u64,
                        "Language service call failed, backing off"
                    );
                    self.stats.lock().await.retries += 1;
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        %purpose,
                        attempt,
                        transient = e.is_transient(),
                        "Language service call failed, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Exponential backoff: `base * 2^(attempt-1)`, capped, plus jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(RETRY_MAX_BACKOFF_EXPONENT);
        let backoff_ms = self
            .retry
            .base_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry.max_backoff_ms);

        let jitter_ms = if self.retry.jitter_ms > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(0..=self.retry.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(backoff_ms.saturating_add(jitter_ms))
    }

    /// Get oracle call statistics
    pub async fn stats(&self) -> InterpreterStats {
        let stats = self.stats.lock().await;
        InterpreterStats {
            interpretations: stats.interpretations,
            interpreted_ok: stats.interpreted_ok,
            format_failures: stats.format_failures,
            service_failures: stats.service_failures,
            retries: stats.retries,
            summaries: stats.summaries,
            avg_latency_ms: if stats.completions > 0 {
                stats.total_latency_ms / stats.completions as f64
            } else {
                0.0
            },
        }
    }
}

/// Strip reasoning blocks, fences and surrounding quotes from prose output.
fn clean_summary(text: &str) -> String {
    let text = match text.rfind("</think>") {
        Some(end) => &text[end + "</think>".len()..],
        None => text,
    };
    text.trim()
        .trim_start_matches("```text")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
