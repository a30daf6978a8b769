//! Engine error taxonomy
//!
//! Input-validation errors are raised synchronously before any work is done.
//! Oracle-related errors (`InterpretationFormat`, `Service`, `Summarization`)
//! are always surfaced to the caller, never swallowed.

use thiserror::Error;

use crate::interpretation::FormatError;
use crate::llm::ServiceError;
use crate::types::{QueueId, ReportId};

/// Errors returned by `PredictionEngine` operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown queue: {0}")]
    UnknownQueue(QueueId),

    #[error("Queue already exists: {0}")]
    DuplicateQueue(QueueId),

    #[error("Unknown report: {0}")]
    UnknownReport(ReportId),

    #[error("Invalid report: {0}")]
    InvalidReport(String),

    #[error("Invalid queue id: {0:?}")]
    InvalidQueueId(String),

    #[error("Invalid queue baseline: {0}")]
    InvalidBaseline(String),

    #[error("Unknown interpretation variant {0} (known: {1})")]
    UnknownVariant(u32, String),

    #[error("Interpretation output rejected: {0}")]
    InterpretationFormat(#[from] FormatError),

    #[error("Language service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Queue {0} has no interpreted reports to forecast from")]
    NoInterpretedReports(QueueId),

    #[error("Summarization failed: {0}")]
    Summarization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
