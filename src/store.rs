//! Report Store and Queue State
//!
//! In-memory map of queues to their baseline and ordered reports, plus an
//! index from report id to its position. Not synchronized by itself; the
//! engine keeps one `QueueStore` behind a lock and is the only mutator.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::types::{HistoricalBaseline, Interpretation, QueueId, Report, ReportId};

/// One queue: immutable priors plus reports in submission order.
#[derive(Debug, Clone)]
pub struct QueueRecord {
    pub baseline: HistoricalBaseline,
    pub created_at: DateTime<Utc>,
    pub reports: Vec<Report>,
}

impl QueueRecord {
    /// Interpretations of interpreted reports, oldest first.
    pub fn interpretations(&self) -> Vec<Interpretation> {
        self.reports
            .iter()
            .filter_map(|r| r.interpretation.clone())
            .collect()
    }

    pub fn interpreted_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_interpreted()).count()
    }
}

#[derive(Debug, Default)]
pub struct QueueStore {
    queues: HashMap<QueueId, QueueRecord>,
    /// Report id -> (owning queue, position in its report list).
    /// Reports are never removed individually, so positions stay valid.
    report_index: HashMap<ReportId, (QueueId, usize)>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_queue(
        &mut self,
        queue_id: QueueId,
        baseline: HistoricalBaseline,
        created_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        if queue_id.as_str().trim().is_empty() {
            return Err(EngineError::InvalidQueueId(queue_id.as_str().to_string()));
        }
        validate_baseline(&baseline)?;
        if self.queues.contains_key(&queue_id) {
            return Err(EngineError::DuplicateQueue(queue_id));
        }
        self.queues.insert(
            queue_id,
            QueueRecord {
                baseline,
                created_at,
                reports: Vec::new(),
            },
        );
        Ok(())
    }

    /// Append a raw report and return its fresh id.
    pub fn submit(
        &mut self,
        queue_id: &QueueId,
        raw_text: String,
        submitted_by: String,
        submitted_at: DateTime<Utc>,
    ) -> EngineResult<ReportId> {
        let record = self
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| EngineError::UnknownQueue(queue_id.clone()))?;

        if raw_text.trim().is_empty() {
            return Err(EngineError::InvalidReport(
                "report text is empty".to_string(),
            ));
        }

        let id = ReportId::generate();
        let position = record.reports.len();
        record.reports.push(Report {
            id,
            queue_id: queue_id.clone(),
            raw_text,
            submitted_by,
            submitted_at,
            variant: 0,
            interpretation: None,
        });
        self.report_index.insert(id, (queue_id.clone(), position));
        Ok(id)
    }

    pub fn queue(&self, queue_id: &QueueId) -> EngineResult<&QueueRecord> {
        self.queues
            .get(queue_id)
            .ok_or_else(|| EngineError::UnknownQueue(queue_id.clone()))
    }

    pub fn report(&self, report_id: ReportId) -> EngineResult<&Report> {
        let (queue_id, position) = self
            .report_index
            .get(&report_id)
            .ok_or(EngineError::UnknownReport(report_id))?;
        self.queues
            .get(queue_id)
            .and_then(|q| q.reports.get(*position))
            .ok_or(EngineError::UnknownReport(report_id))
    }

    /// Write a validated interpretation onto a report in one step.
    /// Overwrites any earlier interpretation.
    pub fn commit_interpretation(
        &mut self,
        report_id: ReportId,
        variant: u32,
        interpretation: Interpretation,
    ) -> EngineResult<Report> {
        let (queue_id, position) = self
            .report_index
            .get(&report_id)
            .ok_or(EngineError::UnknownReport(report_id))?;
        let report = self
            .queues
            .get_mut(queue_id)
            .and_then(|q| q.reports.get_mut(*position))
            .ok_or(EngineError::UnknownReport(report_id))?;

        report.variant = variant;
        report.interpretation = Some(interpretation);
        Ok(report.clone())
    }

    /// Drop a queue and all of its reports. Returns the number of reports
    /// dropped.
    pub fn remove_queue(&mut self, queue_id: &QueueId) -> EngineResult<usize> {
        let record = self
            .queues
            .remove(queue_id)
            .ok_or_else(|| EngineError::UnknownQueue(queue_id.clone()))?;
        for report in &record.reports {
            self.report_index.remove(&report.id);
        }
        Ok(record.reports.len())
    }

    /// Queue ids in sorted order.
    pub fn queue_ids(&self) -> Vec<QueueId> {
        let mut ids: Vec<QueueId> = self.queues.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    pub fn report_count(&self) -> usize {
        self.report_index.len()
    }
}

fn validate_baseline(baseline: &HistoricalBaseline) -> EngineResult<()> {
    for (name, value) in [
        ("hist_avg_wait_mins", baseline.hist_avg_wait_mins),
        ("hist_avg_people_in_line", baseline.hist_avg_people_in_line),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(EngineError::InvalidBaseline(format!(
                "{name} must be a finite non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}
