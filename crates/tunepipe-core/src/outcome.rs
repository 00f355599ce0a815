//! Per-job outcomes and run summary aggregation.
//!
//! Every stage invocation produces one `JobResult`; the worker pool folds
//! them into a `RunSummary` returned to the caller. Nothing here is
//! persisted; disk existence is the pipeline's only durable state.

use std::fmt;

/// Terminal state of one pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Skipped,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::Skipped => "SKIPPED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage invocation.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// What the job was about: a search term or a relative file path.
    pub identifier: String,
    pub status: JobStatus,
    /// Human-readable context: captured tool output, skip reason, target name.
    pub detail: Option<String>,
}

impl JobResult {
    pub fn success(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Success,
            detail: None,
        }
    }

    pub fn success_with(identifier: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Success,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(identifier: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Skipped,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(identifier: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    /// One line for live reporting, e.g. `[SKIPPED] Queen - Bohemian Rhapsody: already present`.
    pub fn render(&self) -> String {
        match &self.detail {
            Some(detail) => format!("[{}] {}: {}", self.status, self.identifier, detail),
            None => format!("[{}] {}", self.status, self.identifier),
        }
    }
}

/// Aggregate counts for one pool run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Identifiers of failed jobs, enough to re-run just the failures.
    pub failed_ids: Vec<String>,
}

impl RunSummary {
    pub fn record(&mut self, result: &JobResult) {
        match result.status {
            JobStatus::Success => self.succeeded += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Failed => {
                self.failed += 1;
                self.failed_ids.push(result.identifier.clone());
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}
