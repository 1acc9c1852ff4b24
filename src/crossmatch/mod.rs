//! Cross-match jobs and their orchestration.
//!
//! One job covers one (survey, catalog) pair: fetch rows from the catalog
//! boundary, normalize them, keep the rows the survey footprint contains
//! and write the matched set to FITS and CSV. The [`orchestrator`] expands
//! the requested survey and catalog selections into a job list, executes
//! the jobs in enumeration order (surveys outer, catalogs inner) and
//! records each outcome in a [`JobResult`]; a failing job never stops the
//! run.

use std::fmt;

use serde::Serialize;

use crate::catalogs::CatalogKey;
use crate::footprints::SurveyKey;
use crate::output::OutputPaths;
use crate::skymatch_errors::SkymatchError;

pub mod job;
pub mod orchestrator;
pub mod progress;

pub use orchestrator::{RunOptions, RunOptionsBuilder, RunSummary};
pub use progress::{ChannelProgress, NullProgress, ProgressEvent, ProgressSink};

/// One (survey, catalog) unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobDescriptor {
    pub survey: SurveyKey,
    pub catalog: CatalogKey,
}

impl fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {}",
            self.survey.file_tag(),
            self.catalog.as_str().to_uppercase()
        )
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every queried row was either matched or cleanly rejected.
    Success,
    /// The job produced output but dropped rows it could not normalize.
    PartialFailure,
    /// The job produced no output.
    Failure,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Success => "success",
            JobStatus::PartialFailure => "partial failure",
            JobStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// The immutable outcome of one job. `n_matched` never exceeds
/// `n_queried`, and `output` is present exactly when both files were
/// renamed into place.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub survey: SurveyKey,
    pub catalog: CatalogKey,
    /// Raw rows returned by the catalog boundary.
    pub n_queried: usize,
    /// Rows inside the footprint, written to the output pair.
    pub n_matched: usize,
    /// Rows dropped during normalization.
    pub n_dropped: usize,
    pub output: Option<OutputPaths>,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobResult {
    pub(crate) fn completed(
        descriptor: JobDescriptor,
        n_queried: usize,
        n_matched: usize,
        n_dropped: usize,
        output: Option<OutputPaths>,
    ) -> JobResult {
        let status = if n_dropped > 0 {
            JobStatus::PartialFailure
        } else {
            JobStatus::Success
        };
        JobResult {
            survey: descriptor.survey,
            catalog: descriptor.catalog,
            n_queried,
            n_matched,
            n_dropped,
            output,
            status,
            error: None,
        }
    }

    pub(crate) fn failure(
        descriptor: JobDescriptor,
        n_queried: usize,
        n_dropped: usize,
        error: &SkymatchError,
    ) -> JobResult {
        JobResult {
            survey: descriptor.survey,
            catalog: descriptor.catalog,
            n_queried,
            n_matched: 0,
            n_dropped,
            output: None,
            status: JobStatus::Failure,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == JobStatus::Failure
    }
}
