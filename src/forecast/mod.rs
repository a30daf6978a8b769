//! Forecast Step - deterministic aggregation of interpreted reports
//!
//! `aggregate` is a pure function over the queue's interpreted reports
//! (oldest first) and its historical baseline. No clock, randomness or
//! language-service call is involved, so repeated calls on unchanged state
//! return identical numbers.
//!
//! ## Weighting
//!
//! Report `i` of `n` gets `w_i = recency_decay^(n-1-i) * ai_confidence_i`.
//! The historical prior enters as a pseudo-report of weight
//! `prior_strength`, so it anchors sparse or low-confidence evidence and
//! fades as reports accumulate.

pub mod summary;

pub use summary::build_summary_prompt;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::defaults::FORECAST_MIN_EVIDENCE;
use crate::config::ForecastConfig;
use crate::types::{
    Forecast, HistoricalBaseline, Interpretation, MinutesRange, MovementRate, QueueId,
};

/// Combine interpreted reports with the baseline. `None` when there are no
/// interpreted reports to forecast from.
pub fn aggregate(
    queue_id: &QueueId,
    baseline: &HistoricalBaseline,
    interpretations: &[Interpretation],
    params: &ForecastConfig,
) -> Option<Forecast> {
    if interpretations.is_empty() {
        return None;
    }

    let weights = report_weights(interpretations, params.recency_decay);
    let total_weight: f64 = weights.iter().sum();
    let prior = params.prior_strength;

    let est_wait_time_mins = blend_with_prior(
        baseline.hist_avg_wait_mins,
        prior,
        interpretations.iter().map(|i| i.estimated_wait_mins),
        &weights,
    );
    let est_people_in_line = blend_with_prior(
        baseline.hist_avg_people_in_line,
        prior,
        interpretations.iter().map(|i| f64::from(i.est_ppl_in_line)),
        &weights,
    );

    let prior_share = if prior + total_weight > 0.0 {
        prior / (prior + total_weight)
    } else {
        1.0
    };

    let entry_probability = if total_weight > 0.0 {
        let score: f64 = interpretations
            .iter()
            .zip(&weights)
            .map(|(i, w)| w * i.entry_outcome.entry_score())
            .sum();
        (score / total_weight).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let confidence_interval_mins =
        wait_interval(interpretations, &weights, est_wait_time_mins, params);

    Some(Forecast {
        queue_id: queue_id.clone(),
        est_wait_time_mins,
        entry_probability,
        confidence_interval_mins,
        est_people_in_line,
        dominant_movement: dominant_movement(interpretations, &weights),
        interpreted_report_count: interpretations.len(),
        report_weight: total_weight,
        prior_share,
        ai_summary: None,
    })
}

/// Recency times confidence, oldest report first.
fn report_weights(interpretations: &[Interpretation], recency_decay: f64) -> Vec<f64> {
    let n = interpretations.len();
    interpretations
        .iter()
        .enumerate()
        .map(|(i, interp)| {
            let age = i32::try_from(n - 1 - i).unwrap_or(i32::MAX);
            recency_decay.powi(age) * interp.ai_confidence
        })
        .collect()
}

/// `(k * prior + Σ w_i x_i) / (k + Σ w_i)`, or the prior when nothing
/// carries weight.
fn blend_with_prior(
    prior_value: f64,
    prior_strength: f64,
    values: impl Iterator<Item = f64>,
    weights: &[f64],
) -> f64 {
    let (weighted_sum, total) = values
        .zip(weights)
        .fold((0.0, 0.0), |(sum, total), (x, w)| (sum + w * x, total + w));

    let denominator = prior_strength + total;
    if denominator > 0.0 {
        (prior_strength * prior_value + weighted_sum) / denominator
    } else {
        prior_value
    }
}

/// Weighted standard deviation of report waits (0 with no weight).
fn weighted_std_dev(interpretations: &[Interpretation], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mean = interpretations
        .iter()
        .zip(weights)
        .map(|(i, w)| w * i.estimated_wait_mins)
        .sum::<f64>()
        / total;
    let variance = interpretations
        .iter()
        .zip(weights)
        .map(|(i, w)| w * (i.estimated_wait_mins - mean).powi(2))
        .sum::<f64>()
        / total;
    variance.max(0.0).sqrt()
}

/// Two-sided standard-normal quantile for a coverage level in (0, 1).
fn two_sided_z(level: f64) -> f64 {
    let q = 0.5 + level.clamp(0.0, 0.999_999) / 2.0;
    Normal::new(0.0, 1.0).map_or(1.0, |n| n.inverse_cdf(q))
}

/// Interval grows with report disagreement and shrinks with the number and
/// average confidence of reports. Always contains the estimate.
fn wait_interval(
    interpretations: &[Interpretation],
    weights: &[f64],
    estimate: f64,
    params: &ForecastConfig,
) -> MinutesRange {
    let spread = weighted_std_dev(interpretations, weights) + params.spread_floor * estimate;
    // n * mean_confidence is the plain confidence sum
    let evidence = interpretations
        .iter()
        .map(|i| i.ai_confidence)
        .sum::<f64>()
        .max(FORECAST_MIN_EVIDENCE);
    let half_width = two_sided_z(params.interval_level) * spread / evidence.sqrt();

    MinutesRange {
        low: (estimate - half_width).max(0.0),
        high: estimate + half_width,
    }
}

/// Movement category with the largest total weight; ties go to the slower
/// category.
fn dominant_movement(interpretations: &[Interpretation], weights: &[f64]) -> Option<MovementRate> {
    let mut best: Option<(MovementRate, f64)> = None;
    for rate in MovementRate::ALL {
        let mass: f64 = interpretations
            .iter()
            .zip(weights)
            .filter(|(i, _)| i.movement_rate == rate)
            .map(|(_, w)| w)
            .sum();
        if mass > 0.0 && best.map_or(true, |(_, m)| mass > m) {
            best = Some((rate, mass));
        }
    }
    best.map(|(rate, _)| rate)
}
