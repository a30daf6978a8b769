//! Summary prompt for the plain-language forecast explanation.
//!
//! The prompt carries the computed numbers and a few recent report excerpts.
//! The language service only phrases them; it never changes the figures.

use crate::config::ForecastConfig;
use crate::types::{Forecast, HistoricalBaseline, Report};

const SUMMARY_FRAME: &str = r#"You explain queue wait forecasts to someone deciding whether to join a line.

### FORECAST
Estimated wait: {wait} minutes (likely range {low} to {high} minutes)
Chance of getting in: {entry}%
Estimated people in line: {people}
Line movement: {movement}
Historical average wait: {hist_wait} minutes
Evidence: {count} interpreted reports; {prior}% of the estimate comes from the historical average

### RECENT REPORTS
{excerpts}

### INSTRUCTIONS
Write 2 or 3 plain sentences. Use only the numbers above and do not invent new ones.
Mention the uncertainty when the range is wide or the chance of getting in is near 50%.
No preamble. No markdown."#;

/// Build the summarization prompt for a computed forecast.
///
/// `reports` is the queue's report list in submission order; only the most
/// recent interpreted ones are quoted, each cut to `summary_excerpt_chars`.
pub fn build_summary_prompt(
    forecast: &Forecast,
    baseline: &HistoricalBaseline,
    reports: &[Report],
    params: &ForecastConfig,
) -> String {
    let excerpts = recent_excerpts(
        reports,
        params.summary_excerpt_reports,
        params.summary_excerpt_chars,
    );
    let movement = forecast
        .dominant_movement
        .map_or("unknown", |m| m.as_str());

    SUMMARY_FRAME
        .replace("{wait}", &format!("{:.0}", forecast.est_wait_time_mins))
        .replace("{low}", &format!("{:.0}", forecast.confidence_interval_mins.low))
        .replace("{high}", &format!("{:.0}", forecast.confidence_interval_mins.high))
        .replace("{entry}", &format!("{:.0}", forecast.entry_probability * 100.0))
        .replace("{people}", &format!("{:.0}", forecast.est_people_in_line))
        .replace("{movement}", movement)
        .replace("{hist_wait}", &format!("{:.0}", baseline.hist_avg_wait_mins))
        .replace("{count}", &forecast.interpreted_report_count.to_string())
        .replace("{prior}", &format!("{:.0}", forecast.prior_share * 100.0))
        .replace("{excerpts}", &excerpts)
}

/// Newest first, one `- "..."` line per report.
fn recent_excerpts(reports: &[Report], max_reports: usize, max_chars: usize) -> String {
    let lines: Vec<String> = reports
        .iter()
        .rev()
        .filter(|r| r.is_interpreted())
        .take(max_reports)
        .map(|r| format!("- \"{}\"", truncate_chars(r.raw_text.trim(), max_chars)))
        .collect();

    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
