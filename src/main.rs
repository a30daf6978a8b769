//! Linecast driver
//!
//! Creates one queue, submits the given bystander reports, interprets them
//! concurrently against the configured language service, then logs the
//! forecast with its plain-language summary.
//!
//! ```text
//! GEMINI_API_KEY=... linecast --queue pop-up-001 --hist-wait 45 --hist-people 20 \
//!     --report "About 10 ppl ahead, moving fast" --variant 1
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use linecast::{config, EngineConfig, GeminiBackend, PredictionEngine, QueueId};

/// Reports used when none are passed on the command line, with their variants.
const DEMO_REPORTS: [(&str, u32); 3] = [
    (
        "Line wraps around two blocks, maybe ~30 people ahead, moving steady but slow",
        0,
    ),
    (
        "About 10 ppl ahead, inside building, moving fast. I am close.",
        1,
    ),
    (
        "Crazy long, not moving at all. People leaving. Looks like a disaster, probably >100 people",
        2,
    ),
];

#[derive(Parser, Debug)]
#[command(name = "linecast")]
#[command(about = "Queue wait-time and entry forecasting from bystander reports")]
#[command(version)]
struct CliArgs {
    /// Path to a linecast.toml (default: $LINECAST_CONFIG, then ./linecast.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Queue identifier
    #[arg(long, default_value = "pop-up-makeup-launch-001")]
    queue: String,

    /// Historical average wait in minutes
    #[arg(long, default_value = "45")]
    hist_wait: f64,

    /// Historical average people in line
    #[arg(long, default_value = "20")]
    hist_people: f64,

    /// Bystander report text (repeatable). Built-in demo reports when omitted.
    #[arg(long = "report", value_name = "TEXT")]
    reports: Vec<String>,

    /// Interpretation variant per report (repeatable; the last one applies to
    /// any remaining reports). 0=balanced, 1=conservative, 2=crowd-dynamics
    #[arg(long = "variant", value_name = "N")]
    variants: Vec<u32>,

    /// Submitter recorded on every report
    #[arg(long, default_value = "cli")]
    submitted_by: String,
}

impl CliArgs {
    /// Reports paired with the variant used to interpret them.
    fn planned_reports(&self) -> Vec<(String, u32)> {
        if self.reports.is_empty() {
            return DEMO_REPORTS
                .iter()
                .map(|(text, variant)| ((*text).to_string(), *variant))
                .collect();
        }
        self.reports
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let variant = self
                    .variants
                    .get(i)
                    .or_else(|| self.variants.last())
                    .copied()
                    .unwrap_or(0);
                (text.clone(), variant)
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let engine_config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    config::init(engine_config);
    let cfg = config::get();

    let backend = GeminiBackend::from_env(&cfg.llm).with_context(|| {
        format!(
            "Failed to set up language service (is {} set?)",
            cfg.llm.api_key_env
        )
    })?;
    info!(model = backend.model(), "Language service ready");

    let engine = PredictionEngine::with_config(Arc::new(backend), cfg);

    let queue_id = QueueId::new(args.queue.clone());
    engine
        .create_queue(queue_id.clone(), args.hist_wait, args.hist_people)
        .context("Failed to create queue")?;

    let mut submitted = Vec::new();
    for (text, variant) in args.planned_reports() {
        let report_id = engine
            .submit_user_report(&queue_id, text.as_str(), args.submitted_by.as_str())
            .with_context(|| format!("Failed to submit report {text:?}"))?;
        submitted.push((report_id, variant));
    }

    let results = join_all(
        submitted
            .iter()
            .map(|(report_id, variant)| engine.interpret_report(*report_id, *variant)),
    )
    .await;

    for ((report_id, variant), result) in submitted.iter().zip(results) {
        match result {
            Ok(report) => info!(
                report_id = %report_id,
                variant,
                est_ppl_in_line = report.est_ppl_in_line(),
                estimated_wait_mins = report.estimated_wait_mins(),
                movement_rate = report.movement_rate().map(|m| m.as_str()),
                entry_outcome = report.entry_outcome().map(|o| o.as_str()),
                ai_confidence = report.ai_confidence(),
                "Interpreted report"
            ),
            Err(e) => warn!(report_id = %report_id, variant, error = %e, "interpret_report failed"),
        }
    }

    let forecast = engine
        .predict_with_summary(&queue_id)
        .await
        .context("Prediction failed")?;

    info!(
        queue_id = %forecast.queue_id,
        est_wait_time_mins = %format!("{:.1}", forecast.est_wait_time_mins),
        entry_probability = %format!("{:.2}", forecast.entry_probability),
        confidence_interval = %forecast.confidence_interval_mins,
        est_people_in_line = %format!("{:.0}", forecast.est_people_in_line),
        dominant_movement = forecast.dominant_movement.map(|m| m.as_str()),
        reports = forecast.interpreted_report_count,
        prior_share = %format!("{:.2}", forecast.prior_share),
        "Prediction result"
    );
    match &forecast.ai_summary {
        Some(summary) => info!("Summary: {summary}"),
        None => warn!("No summary available"),
    }

    info!("All stored reports:");
    for report in engine.get_reports(&queue_id)? {
        info!(
            "- {} {:?} => ppl={:?} wait={:?} movement={:?}",
            report.id,
            report.raw_text,
            report.est_ppl_in_line(),
            report.estimated_wait_mins(),
            report.movement_rate().map(|m| m.as_str())
        );
    }

    info!("{}", engine.interpreter_stats().await);
    Ok(())
}
