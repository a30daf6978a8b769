//! Prediction Engine facade
//!
//! Owns every queue and report and is the only mutation path. Callers get
//! cloned snapshots, never references into internal state.
//!
//! ## Locking
//!
//! All queue state sits behind one `std::sync::RwLock<QueueStore>`. No guard
//! is ever held across an `.await`: interpretation snapshots the report,
//! releases the lock, waits on the language service, then re-locks to
//! commit. Dropping an in-flight future therefore leaves state untouched.

use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, ForecastConfig};
use crate::error::{EngineError, EngineResult};
use crate::forecast::{aggregate, build_summary_prompt};
use crate::interpretation::{InterpretationVariant, Interpreter, InterpreterStats};
use crate::llm::LlmBackend;
use crate::store::QueueStore;
use crate::types::{Forecast, HistoricalBaseline, QueueId, Report, ReportId};

pub struct PredictionEngine {
    state: RwLock<QueueStore>,
    interpreter: Interpreter,
    forecast: ForecastConfig,
}

impl PredictionEngine {
    /// Engine with default tuning.
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self::with_config(backend, &EngineConfig::default())
    }

    pub fn with_config(backend: Arc<dyn LlmBackend>, config: &EngineConfig) -> Self {
        info!(
            backend = backend.backend_name(),
            max_attempts = config.interpretation.max_attempts,
            recency_decay = config.forecast.recency_decay,
            prior_strength = config.forecast.prior_strength,
            "Prediction engine initialized"
        );
        Self {
            state: RwLock::new(QueueStore::new()),
            interpreter: Interpreter::new(backend, config.interpretation.clone()),
            forecast: config.forecast.clone(),
        }
    }

    // Every store mutation is a single insert or assignment, so a poisoned
    // store is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, QueueStore> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("Queue state lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, QueueStore> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("Queue state lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    // ========================================================================
    // Queues and Reports
    // ========================================================================

    /// Register a queue with its historical priors.
    pub fn create_queue(
        &self,
        queue_id: impl Into<QueueId>,
        hist_avg_wait_mins: f64,
        hist_avg_people_in_line: f64,
    ) -> EngineResult<()> {
        let queue_id = queue_id.into();
        let baseline = HistoricalBaseline {
            hist_avg_wait_mins,
            hist_avg_people_in_line,
        };
        self.write()
            .create_queue(queue_id.clone(), baseline, Utc::now())?;

        info!(
            queue_id = %queue_id,
            hist_avg_wait_mins,
            hist_avg_people_in_line,
            "Queue created"
        );
        Ok(())
    }

    /// Store a raw report. No interpretation happens here.
    pub fn submit_user_report(
        &self,
        queue_id: &QueueId,
        raw_text: impl Into<String>,
        submitted_by: impl Into<String>,
    ) -> EngineResult<ReportId> {
        let report_id = self.write().submit(
            queue_id,
            raw_text.into(),
            submitted_by.into(),
            Utc::now(),
        )?;
        debug!(queue_id = %queue_id, report_id = %report_id, "Report submitted");
        Ok(report_id)
    }

    /// Ordered snapshot of a queue's reports.
    pub fn get_reports(&self, queue_id: &QueueId) -> EngineResult<Vec<Report>> {
        Ok(self.read().queue(queue_id)?.reports.clone())
    }

    pub fn get_report(&self, report_id: ReportId) -> EngineResult<Report> {
        self.read().report(report_id).cloned()
    }

    pub fn queue_ids(&self) -> Vec<QueueId> {
        self.read().queue_ids()
    }

    pub fn queue_baseline(&self, queue_id: &QueueId) -> EngineResult<HistoricalBaseline> {
        Ok(self.read().queue(queue_id)?.baseline)
    }

    /// Drop a queue with all its reports; returns how many reports went with
    /// it. Their ids are never reissued.
    pub fn remove_queue(&self, queue_id: &QueueId) -> EngineResult<usize> {
        let dropped = self.write().remove_queue(queue_id)?;
        info!(queue_id = %queue_id, reports_dropped = dropped, "Queue removed");
        Ok(dropped)
    }

    // ========================================================================
    // Interpretation
    // ========================================================================

    /// Interpret one report with the selected template variant and commit the
    /// result atomically. Re-interpreting an interpreted report overwrites
    /// it. On any failure the report is left exactly as it was.
    pub async fn interpret_report(&self, report_id: ReportId, variant: u32) -> EngineResult<Report> {
        let (raw_text, baseline, queue_id) = {
            let store = self.read();
            let report = store.report(report_id)?;
            let baseline = store.queue(&report.queue_id)?.baseline;
            (report.raw_text.clone(), baseline, report.queue_id.clone())
        };

        let template = InterpretationVariant::from_index(variant).ok_or_else(|| {
            EngineError::UnknownVariant(variant, InterpretationVariant::known_variants())
        })?;

        let interpretation = match self
            .interpreter
            .interpret(&raw_text, &baseline, template)
            .await
        {
            Ok(i) => i,
            Err(e) => {
                warn!(
                    queue_id = %queue_id,
                    report_id = %report_id,
                    variant,
                    error = %e,
                    "Interpretation failed, report left unchanged"
                );
                return Err(e);
            }
        };

        let report = self
            .write()
            .commit_interpretation(report_id, variant, interpretation)?;

        info!(
            queue_id = %queue_id,
            report_id = %report_id,
            variant = template.name(),
            est_ppl_in_line = report.est_ppl_in_line(),
            estimated_wait_mins = report.estimated_wait_mins(),
            ai_confidence = report.ai_confidence(),
            "Report interpreted"
        );
        Ok(report)
    }

    // ========================================================================
    // Forecast
    // ========================================================================

    /// Deterministic forecast from the queue's interpreted reports and
    /// baseline. Never calls the language service.
    pub fn run_prediction(&self, queue_id: &QueueId) -> EngineResult<Forecast> {
        let (baseline, interpretations) = {
            let store = self.read();
            let record = store.queue(queue_id)?;
            (record.baseline, record.interpretations())
        };

        let forecast = aggregate(queue_id, &baseline, &interpretations, &self.forecast)
            .ok_or_else(|| EngineError::NoInterpretedReports(queue_id.clone()))?;

        debug!(
            queue_id = %queue_id,
            report_weight = forecast.report_weight,
            prior_share = forecast.prior_share,
            "Forecast weights"
        );
        info!(
            queue_id = %queue_id,
            est_wait_time_mins = forecast.est_wait_time_mins,
            entry_probability = forecast.entry_probability,
            interval = %forecast.confidence_interval_mins,
            reports = forecast.interpreted_report_count,
            "Forecast computed"
        );
        Ok(forecast)
    }

    /// Recompute the forecast and have the language service phrase it.
    /// Queue and report state are not touched.
    pub async fn summarize_forecast(&self, queue_id: &QueueId) -> EngineResult<String> {
        let forecast = self.run_prediction(queue_id)?;
        self.summarize(&forecast).await
    }

    /// Forecast with `ai_summary` filled in when summarization succeeds.
    /// A summarization failure is logged and the numeric forecast is
    /// returned without a summary.
    pub async fn predict_with_summary(&self, queue_id: &QueueId) -> EngineResult<Forecast> {
        let mut forecast = self.run_prediction(queue_id)?;
        match self.summarize(&forecast).await {
            Ok(summary) => forecast.ai_summary = Some(summary),
            Err(e) => warn!(
                queue_id = %queue_id,
                error = %e,
                "Summarization failed, returning numeric forecast only"
            ),
        }
        Ok(forecast)
    }

    async fn summarize(&self, forecast: &Forecast) -> EngineResult<String> {
        let prompt = {
            let store = self.read();
            let record = store.queue(&forecast.queue_id)?;
            build_summary_prompt(forecast, &record.baseline, &record.reports, &self.forecast)
        };
        debug!(
            queue_id = %forecast.queue_id,
            prompt_chars = prompt.len(),
            "Built summary prompt"
        );

        let summary = self.interpreter.summarize(&prompt).await?;
        info!(
            queue_id = %forecast.queue_id,
            summary_chars = summary.len(),
            "Forecast summarized"
        );
        Ok(summary)
    }

    /// Language-service call counters.
    pub async fn interpreter_stats(&self) -> InterpreterStats {
        self.interpreter.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedBackend;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_is_send_sync() {
        assert_send_sync::<PredictionEngine>();
    }

    #[tokio::test]
    async fn test_interpret_futures_are_send() {
        fn assert_send<T: Send>(_: &T) {}

        let engine = PredictionEngine::new(Arc::new(ScriptedBackend::new()));
        engine.create_queue("q", 10.0, 5.0).unwrap();
        let q = QueueId::from("q");
        let id = engine.submit_user_report(&q, "text", "u").unwrap();

        let fut = engine.interpret_report(id, 0);
        assert_send(&fut);
        drop(fut);

        let fut = engine.predict_with_summary(&q);
        assert_send(&fut);
    }

    #[tokio::test]
    async fn test_unknown_report_checked_before_variant() {
        let engine = PredictionEngine::new(Arc::new(ScriptedBackend::new()));
        let missing = ReportId::generate();
        assert!(matches!(
            engine.interpret_report(missing, 99).await,
            Err(EngineError::UnknownReport(_))
        ));
    }
}
