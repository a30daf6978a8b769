//! End-to-end engine scenarios against the scripted language service.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use linecast::{
    EngineConfig, EngineError, EntryOutcome, FormatError, InterpretationConfig, MovementRate,
    PredictionEngine, QueueId, ScriptedBackend, ServiceError,
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn oracle(ppl: u32, wait: f64, movement: &str, outcome: &str, confidence: f64) -> String {
    json!({
        "estPplInLine": ppl,
        "estimatedWaitMins": wait,
        "movementRate": movement,
        "entryOutcome": outcome,
        "aiConfidence": confidence,
    })
    .to_string()
}

fn engine_with(backend: &Arc<ScriptedBackend>) -> PredictionEngine {
    let config = EngineConfig {
        interpretation: InterpretationConfig::without_backoff(3),
        ..EngineConfig::default()
    };
    PredictionEngine::with_config(Arc::<ScriptedBackend>::clone(backend), &config)
}

fn popup_queue(engine: &PredictionEngine) -> QueueId {
    engine.create_queue("pop-up-001", 45.0, 20.0).unwrap();
    QueueId::from("pop-up-001")
}

// ============================================================================
// Queues and Reports
// ============================================================================

#[test]
fn new_queue_has_no_reports() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let q = popup_queue(&engine);

    assert!(engine.get_reports(&q).unwrap().is_empty());
    assert_eq!(engine.queue_ids(), vec![q]);
}

#[test]
fn duplicate_queue_leaves_original_baseline() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let q = popup_queue(&engine);

    let err = engine.create_queue("pop-up-001", 5.0, 1.0).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateQueue(id) if id == q));

    let baseline = engine.queue_baseline(&q).unwrap();
    assert_eq!(baseline.hist_avg_wait_mins, 45.0);
    assert_eq!(baseline.hist_avg_people_in_line, 20.0);
}

#[test]
fn invalid_baseline_is_rejected() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    assert!(matches!(
        engine.create_queue("q", -1.0, 10.0),
        Err(EngineError::InvalidBaseline(_))
    ));
    assert!(matches!(
        engine.create_queue("q", 10.0, f64::INFINITY),
        Err(EngineError::InvalidBaseline(_))
    ));
    assert!(engine.queue_ids().is_empty());
}

#[test]
fn blank_queue_id_is_rejected() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let err = engine.create_queue("   ", 45.0, 20.0).unwrap_err();
    assert!(matches!(err, EngineError::InvalidQueueId(_)));
    assert!(err.to_string().contains("queue id"));
    assert!(engine.queue_ids().is_empty());
}

#[test]
fn submit_to_unknown_queue_fails() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let err = engine
        .submit_user_report(&QueueId::from("nowhere"), "long line", "u")
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownQueue(_)));
}

#[test]
fn blank_report_is_invalid() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let q = popup_queue(&engine);

    assert!(matches!(
        engine.submit_user_report(&q, "   ", "u"),
        Err(EngineError::InvalidReport(_))
    ));
    assert!(engine.get_reports(&q).unwrap().is_empty());
}

#[test]
fn submissions_get_distinct_ids_in_order() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    let q = popup_queue(&engine);

    let ids: Vec<_> = (0..5)
        .map(|i| {
            engine
                .submit_user_report(&q, format!("report {i}"), "u")
                .unwrap()
        })
        .collect();

    let reports = engine.get_reports(&q).unwrap();
    let stored: Vec<_> = reports.iter().map(|r| r.id).collect();
    assert_eq!(stored, ids);
    assert_eq!(reports[3].raw_text, "report 3");
    assert!(reports.iter().all(|r| !r.is_interpreted() && r.variant == 0));

    let mut unique = ids.clone();
    unique.sort_by_key(ToString::to_string);
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

// ============================================================================
// Interpretation
// ============================================================================

#[tokio::test]
async fn fast_short_line_beats_history() {
    let backend = Arc::new(
        ScriptedBackend::new().respond(oracle(10, 12.0, "fast", "likely-enter", 0.8)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);

    let id = engine
        .submit_user_report(&q, "10 people ahead, moving fast", "tester")
        .unwrap();
    let report = engine.interpret_report(id, 1).await.unwrap();

    assert_eq!(report.variant, 1);
    assert_eq!(report.est_ppl_in_line(), Some(10));
    assert_eq!(report.movement_rate(), Some(MovementRate::Fast));
    assert_eq!(report.entry_outcome(), Some(EntryOutcome::LikelyEnter));
    assert_eq!(engine.get_report(id).unwrap(), report);

    let prompt = &backend.prompts()[0];
    assert!(prompt.contains("10 people ahead, moving fast"));
    assert!(prompt.contains("Historical average wait: 45 minutes"));

    let forecast = engine.run_prediction(&q).unwrap();
    assert!(forecast.est_wait_time_mins < 45.0);
    assert!(forecast.entry_probability > 0.5);
    assert!(forecast.ai_summary.is_none());
    assert!(forecast
        .confidence_interval_mins
        .contains(forecast.est_wait_time_mins));
}

#[tokio::test]
async fn out_of_range_confidence_leaves_report_uninterpreted() {
    let backend = Arc::new(
        ScriptedBackend::new().respond(oracle(10, 12.0, "fast", "likely-enter", 1.5)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "short line", "u").unwrap();

    let err = engine.interpret_report(id, 0).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InterpretationFormat(FormatError::OutOfRange { .. })
    ));

    let report = engine.get_report(id).unwrap();
    assert!(!report.is_interpreted());
    assert_eq!(report.variant, 0);
    assert!(matches!(
        engine.run_prediction(&q),
        Err(EngineError::NoInterpretedReports(_))
    ));
}

#[tokio::test]
async fn reinterpretation_overwrites_previous_reading() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(oracle(30, 40.0, "slow", "uncertain", 0.6))
            .respond(oracle(80, 90.0, "stalled", "likely-rejected", 0.9)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "two blocks, slow", "u").unwrap();

    engine.interpret_report(id, 0).await.unwrap();
    let second = engine.interpret_report(id, 2).await.unwrap();

    assert_eq!(second.variant, 2);
    assert_eq!(second.est_ppl_in_line(), Some(80));
    assert_eq!(second.estimated_wait_mins(), Some(90.0));
    assert_eq!(second.movement_rate(), Some(MovementRate::Stalled));
    assert_eq!(second.entry_outcome(), Some(EntryOutcome::LikelyRejected));
    assert_eq!(second.ai_confidence(), Some(0.9));
    assert_eq!(engine.run_prediction(&q).unwrap().interpreted_report_count, 1);
}

#[tokio::test]
async fn failed_reinterpretation_keeps_previous_reading() {
    let missing_wait = json!({
        "estPplInLine": 80,
        "movementRate": "stalled",
        "entryOutcome": "likely-rejected",
        "aiConfidence": 0.9,
    })
    .to_string();
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(oracle(30, 40.0, "slow", "uncertain", 0.6))
            .respond(missing_wait),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "two blocks, slow", "u").unwrap();

    let first = engine.interpret_report(id, 1).await.unwrap();
    let before = engine.run_prediction(&q).unwrap();

    let err = engine.interpret_report(id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InterpretationFormat(FormatError::MissingField("estimatedWaitMins"))
    ));

    let report = engine.get_report(id).unwrap();
    assert_eq!(report, first);
    assert_eq!(report.variant, 1);
    assert_eq!(report.est_ppl_in_line(), Some(30));
    assert_eq!(report.movement_rate(), Some(MovementRate::Slow));
    assert_eq!(engine.get_reports(&q).unwrap(), vec![first]);

    let after = engine.run_prediction(&q).unwrap();
    assert_eq!(after.est_wait_time_mins, before.est_wait_time_mins);
    assert_eq!(after.entry_probability, before.entry_probability);
}

#[tokio::test]
async fn conflicting_oracle_fields_are_rejected() {
    let ambiguous = json!({
        "aiConfidence": 0.1,
        "ai_confidence": 0.9,
        "estPplInLine": 10,
        "est_ppl_in_line": 500,
        "estimatedWaitMins": 12,
        "movementRate": "fast",
        "movement_rate": "stalled",
        "entryOutcome": "likely-enter",
    })
    .to_string();
    let backend = Arc::new(ScriptedBackend::new().respond(ambiguous));
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "short line", "u").unwrap();

    assert!(matches!(
        engine.interpret_report(id, 0).await,
        Err(EngineError::InterpretationFormat(FormatError::ConflictingField(_)))
    ));
    assert!(!engine.get_report(id).unwrap().is_interpreted());
}

#[tokio::test]
async fn unknown_variant_is_rejected_before_any_call() {
    let backend = Arc::new(ScriptedBackend::always(oracle(1, 1.0, "fast", "likely-enter", 1.0)));
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "text", "u").unwrap();

    match engine.interpret_report(id, 7).await {
        Err(EngineError::UnknownVariant(7, known)) => assert!(known.contains("0=balanced")),
        other => panic!("expected unknown variant, got {other:?}"),
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .fail(ServiceError::Status {
                status: 503,
                body: "overloaded".into(),
            })
            .respond(oracle(5, 8.0, "steady", "likely-enter", 0.7)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "short", "u").unwrap();

    assert!(engine.interpret_report(id, 0).await.is_ok());

    let stats = engine.interpreter_stats().await;
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.interpreted_ok, 1);
}

#[tokio::test]
async fn permanent_service_failure_surfaces_and_leaves_report() {
    let backend = Arc::new(ScriptedBackend::new().fail(ServiceError::Auth("bad key".into())));
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "short", "u").unwrap();

    assert!(matches!(
        engine.interpret_report(id, 0).await,
        Err(EngineError::Service(ServiceError::Auth(_)))
    ));
    assert_eq!(backend.call_count(), 1);
    assert!(!engine.get_report(id).unwrap().is_interpreted());
}

#[tokio::test]
async fn cancelled_interpretation_leaves_state_untouched() {
    let backend = Arc::new(
        ScriptedBackend::always(oracle(10, 12.0, "fast", "likely-enter", 0.8))
            .with_delay(Duration::from_secs(5)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "text", "u").unwrap();
    let before = engine.get_reports(&q).unwrap();

    let outcome =
        tokio::time::timeout(Duration::from_millis(20), engine.interpret_report(id, 0)).await;

    assert!(outcome.is_err(), "call should have been cancelled");
    assert_eq!(engine.get_reports(&q).unwrap(), before);
}

#[tokio::test]
async fn queue_removed_mid_flight_fails_commit() {
    let backend = Arc::new(
        ScriptedBackend::always(oracle(10, 12.0, "fast", "likely-enter", 0.8))
            .with_delay(Duration::from_millis(100)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "text", "u").unwrap();

    let (interpreted, removed) = tokio::join!(engine.interpret_report(id, 0), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.remove_queue(&q)
    });

    assert_eq!(removed.unwrap(), 1);
    assert!(matches!(interpreted, Err(EngineError::UnknownReport(r)) if r == id));
    assert!(matches!(engine.get_report(id), Err(EngineError::UnknownReport(_))));
}

#[tokio::test]
async fn concurrent_interpretations_all_commit() {
    let backend = Arc::new(
        ScriptedBackend::always(oracle(12, 20.0, "steady", "uncertain", 0.5))
            .with_delay(Duration::from_millis(5)),
    );
    let engine = Arc::new(engine_with(&backend));
    let q = popup_queue(&engine);

    let ids: Vec<_> = (0..8)
        .map(|i| engine.submit_user_report(&q, format!("report {i}"), "u").unwrap())
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            let id = *id;
            tokio::spawn(async move { engine.interpret_report(id, 0).await })
        })
        .collect();

    for result in join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    let reports = engine.get_reports(&q).unwrap();
    assert!(reports.iter().all(|r| r.is_interpreted()));
    assert_eq!(backend.call_count(), 8);
    assert_eq!(engine.run_prediction(&q).unwrap().interpreted_report_count, 8);
}

// ============================================================================
// Forecast and Summary
// ============================================================================

#[tokio::test]
async fn prediction_is_idempotent() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(oracle(30, 40.0, "slow", "uncertain", 0.6))
            .respond(oracle(12, 15.0, "fast", "likely-enter", 0.9)),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    for text in ["two blocks, slow", "moving fast now"] {
        let id = engine.submit_user_report(&q, text, "u").unwrap();
        engine.interpret_report(id, 0).await.unwrap();
    }
    // An uninterpreted report does not change the forecast
    engine.submit_user_report(&q, "pending", "u").unwrap();

    let first = engine.run_prediction(&q).unwrap();
    let second = engine.run_prediction(&q).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.interpreted_report_count, 2);
    assert!((0.0..=1.0).contains(&first.entry_probability));
    assert!(first.confidence_interval_mins.width() >= 0.0);
}

#[test]
fn prediction_on_unknown_or_empty_queue_fails() {
    let engine = engine_with(&Arc::new(ScriptedBackend::new()));
    assert!(matches!(
        engine.run_prediction(&QueueId::from("missing")),
        Err(EngineError::UnknownQueue(_))
    ));

    let q = popup_queue(&engine);
    engine.submit_user_report(&q, "not yet interpreted", "u").unwrap();
    assert!(matches!(
        engine.run_prediction(&q),
        Err(EngineError::NoInterpretedReports(_))
    ));
}

#[tokio::test]
async fn summary_is_phrased_from_forecast() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(oracle(10, 12.0, "fast", "likely-enter", 0.8))
            .respond("Expect roughly half an hour; you will very likely get in."),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine
        .submit_user_report(&q, "10 people ahead, moving fast", "u")
        .unwrap();
    engine.interpret_report(id, 0).await.unwrap();

    let forecast = engine.predict_with_summary(&q).await.unwrap();
    assert_eq!(
        forecast.ai_summary.as_deref(),
        Some("Expect roughly half an hour; you will very likely get in.")
    );

    let summary_prompt = &backend.prompts()[1];
    assert!(summary_prompt.contains("Estimated wait: 30 minutes"));
    assert!(summary_prompt.contains("10 people ahead, moving fast"));

    // The stored numeric forecast never carries the summary
    assert!(engine.run_prediction(&q).unwrap().ai_summary.is_none());
}

#[tokio::test]
async fn summary_failure_leaves_forecast_unchanged() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(oracle(10, 12.0, "fast", "likely-enter", 0.8))
            .fail(ServiceError::Auth("expired".into()))
            .respond("   "),
    );
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);
    let id = engine.submit_user_report(&q, "short line", "u").unwrap();
    engine.interpret_report(id, 0).await.unwrap();

    let before = engine.run_prediction(&q).unwrap();
    let reports_before = engine.get_reports(&q).unwrap();

    assert!(matches!(
        engine.summarize_forecast(&q).await,
        Err(EngineError::Summarization(_))
    ));

    let fallback = engine.predict_with_summary(&q).await.unwrap();
    assert!(fallback.ai_summary.is_none());
    assert_eq!(fallback, before);

    assert_eq!(engine.run_prediction(&q).unwrap(), before);
    assert_eq!(engine.get_reports(&q).unwrap(), reports_before);
}

#[tokio::test]
async fn summarize_requires_interpreted_reports() {
    let backend = Arc::new(ScriptedBackend::always("unused"));
    let engine = engine_with(&backend);
    let q = popup_queue(&engine);

    assert!(matches!(
        engine.summarize_forecast(&q).await,
        Err(EngineError::NoInterpretedReports(_))
    ));
    assert_eq!(backend.call_count(), 0);
}
