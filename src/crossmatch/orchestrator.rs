//! Run orchestration.
//!
//! A run expands the survey and catalog selections into a job list, executes
//! the jobs one by one and collects their results. Job failures never stop
//! the run; only configuration errors (unknown keys, a bad row limit, an
//! unreadable mask) abort before any job starts.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashSet;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::iproduct;
use log::info;
use serde::{Deserialize, Serialize};

use crate::catalogs::{CatalogKey, CatalogQueryService};
use crate::crossmatch::job::{self, JobContext};
use crate::crossmatch::{JobDescriptor, JobResult, ProgressEvent, ProgressSink};
use crate::footprints::{HealpixMask, SurveyKey};
use crate::output::ResultWriter;
use crate::skymatch_errors::SkymatchError;

/// Configuration of a cross-match run.
///
/// Selections are plain strings so they can come straight from a CLI or a
/// config file; they are resolved to keys when the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Survey selection. The exact entry `"all"` expands to every survey.
    pub surveys: Vec<String>,
    /// Catalog selection. The exact entry `"all"` expands to every remote
    /// catalog; `"custom"` must be named explicitly to be included.
    pub catalogs: Vec<String>,
    /// HEALPix mask that replaces every survey's native footprint when set.
    pub mask_path: Option<Utf8PathBuf>,
    /// Directory the output pairs are written into.
    pub output_dir: Utf8PathBuf,
    /// Upper bound on rows fetched per catalog query.
    pub row_limit: usize,
    /// Catalog file backing the `custom` catalog key.
    pub custom_file: Option<Utf8PathBuf>,
    pub custom_ra_col: String,
    pub custom_dec_col: String,
}

impl RunOptions {
    /// Create a new [`RunOptionsBuilder`] starting from the defaults.
    ///
    /// The builder validates on [`build`](RunOptionsBuilder::build), so a
    /// misspelled key or a zero row limit surfaces before any job runs.
    pub fn builder() -> RunOptionsBuilder {
        RunOptionsBuilder::new()
    }
}

impl Default for RunOptions {
    fn default() -> RunOptions {
        RunOptions {
            surveys: vec!["hlwas".to_string()],
            catalogs: vec!["abell".to_string(), "ngc".to_string()],
            mask_path: None,
            output_dir: Utf8PathBuf::from("skymatch_output"),
            row_limit: 100_000,
            custom_file: None,
            custom_ra_col: "RA".to_string(),
            custom_dec_col: "Dec".to_string(),
        }
    }
}

/// Builder for [`RunOptions`], with validation.
#[derive(Debug, Clone)]
pub struct RunOptionsBuilder {
    opts: RunOptions,
}

impl Default for RunOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunOptionsBuilder {
    /// Create a new builder initialized with default values.
    pub fn new() -> Self {
        Self {
            opts: RunOptions::default(),
        }
    }

    pub fn surveys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.opts.surveys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn catalogs<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.opts.catalogs = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn mask_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.opts.mask_path = Some(path.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.opts.output_dir = dir.into();
        self
    }

    pub fn row_limit(mut self, limit: usize) -> Self {
        self.opts.row_limit = limit;
        self
    }

    pub fn custom_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.opts.custom_file = Some(path.into());
        self
    }

    /// Coordinate column names of the custom catalog file.
    pub fn custom_columns(mut self, ra_col: &str, dec_col: &str) -> Self {
        self.opts.custom_ra_col = ra_col.to_string();
        self.opts.custom_dec_col = dec_col.to_string();
        self
    }

    /// Finalize the builder and produce a validated [`RunOptions`].
    ///
    /// Return
    /// ------
    /// * `Ok(RunOptions)` when every selection key parses and the row limit
    ///   is positive.
    /// * The first configuration error otherwise, the same error [`run`]
    ///   would report.
    pub fn build(self) -> Result<RunOptions, SkymatchError> {
        if self.opts.row_limit == 0 {
            return Err(SkymatchError::InvalidRowLimit(0));
        }
        resolve_surveys(&self.opts.surveys)?;
        resolve_catalogs(&self.opts.catalogs, self.opts.custom_file.is_some())?;
        Ok(self.opts)
    }
}

/// Outcome of a run: one result per executed job, in job order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub results: Vec<JobResult>,
    /// Number of jobs the selection expanded to, executed or not.
    pub total_jobs: usize,
    /// Absolute path of the output directory.
    pub output_dir: Utf8PathBuf,
}

impl RunSummary {
    /// Matched objects across every job that produced output.
    pub fn total_matched(&self) -> usize {
        self.results.iter().map(|r| r.n_matched).sum()
    }

    pub fn completed(&self) -> usize {
        self.results.len()
    }

    /// Whether the run stopped before executing every expanded job.
    pub fn cancelled(&self) -> bool {
        self.results.len() < self.total_jobs
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

impl fmt::Display for RunSummary {
    /// Totals and failures by default; one line per job with the alternate
    /// flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ruler = "=".repeat(55);
        writeln!(f, "{ruler}")?;
        writeln!(
            f,
            "  Complete: {} total matched objects across {} jobs",
            self.total_matched(),
            self.completed()
        )?;
        if f.alternate() {
            for result in &self.results {
                writeln!(
                    f,
                    "  {} x {}: {} matched of {} queried ({})",
                    result.survey.file_tag(),
                    result.catalog.as_str(),
                    result.n_matched,
                    result.n_queried,
                    result.status
                )?;
            }
        } else {
            for failed in self.failures() {
                writeln!(
                    f,
                    "  Failed: {} x {}",
                    failed.survey.file_tag(),
                    failed.catalog.as_str()
                )?;
            }
        }
        writeln!(f, "  Output directory: {}", self.output_dir)?;
        write!(f, "{ruler}")
    }
}

/// Resolve a survey selection, expanding `"all"` and dropping duplicates
/// while keeping first occurrences in order.
pub(crate) fn resolve_surveys(selection: &[String]) -> Result<Vec<SurveyKey>, SkymatchError> {
    let mut keys = if selection.iter().any(|s| s == "all") {
        SurveyKey::ALL.to_vec()
    } else {
        selection
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<SurveyKey>, _>>()?
    };
    let mut seen = AHashSet::new();
    keys.retain(|k| seen.insert(*k));
    Ok(keys)
}

/// Resolve a catalog selection. `"all"` covers the remote catalogs only;
/// the custom catalog joins when it is named and a file is configured.
pub(crate) fn resolve_catalogs(
    selection: &[String],
    has_custom_file: bool,
) -> Result<Vec<CatalogKey>, SkymatchError> {
    let mut keys = if selection.iter().any(|s| s == "all") {
        let mut keys = CatalogKey::REMOTE.to_vec();
        if has_custom_file && selection.iter().any(|s| s == "custom") {
            keys.push(CatalogKey::Custom);
        }
        keys
    } else {
        selection
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<CatalogKey>, _>>()?
    };
    let mut seen = AHashSet::new();
    keys.retain(|k| seen.insert(*k));
    Ok(keys)
}

/// Execute a full cross-match run.
///
/// Arguments
/// ---------
/// * `service`: catalog boundary the jobs query through.
/// * `opts`: run configuration.
/// * `sink`: receives one event after each finished job.
/// * `cancel`: optional flag polled between jobs; once set, no further job
///   starts and the summary covers the completed prefix.
///
/// Return
/// ------
/// * The run summary, or the configuration error that prevented the run
///   from starting.
pub fn run(
    service: &dyn CatalogQueryService,
    opts: &RunOptions,
    sink: &dyn ProgressSink,
    cancel: Option<&AtomicBool>,
) -> Result<RunSummary, SkymatchError> {
    if opts.row_limit == 0 {
        return Err(SkymatchError::InvalidRowLimit(0));
    }
    let surveys = resolve_surveys(&opts.surveys)?;
    let catalogs = resolve_catalogs(&opts.catalogs, opts.custom_file.is_some())?;

    let mask = match &opts.mask_path {
        Some(path) => {
            info!("loading HEALPix mask: {path}");
            let mask = HealpixMask::load(path)?;
            info!(
                "mask loaded: nside={}, {} active pixels",
                mask.nside(),
                mask.active_pixels()
            );
            Some(Arc::new(mask))
        }
        None => None,
    };

    let jobs: Vec<JobDescriptor> = iproduct!(surveys.iter(), catalogs.iter())
        .map(|(survey, catalog)| JobDescriptor {
            survey: *survey,
            catalog: *catalog,
        })
        .collect();
    let total = jobs.len();
    info!(
        "starting run: {} surveys x {} catalogs = {total} jobs",
        surveys.len(),
        catalogs.len()
    );

    let writer = ResultWriter::new(opts.output_dir.clone());
    let ctx = JobContext {
        service,
        writer: &writer,
        row_limit: opts.row_limit,
        mask,
        custom_file: opts.custom_file.as_deref(),
        custom_ra_col: &opts.custom_ra_col,
        custom_dec_col: &opts.custom_dec_col,
    };

    let mut results: Vec<JobResult> = Vec::with_capacity(total);
    let mut current_survey = None;
    for descriptor in jobs {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                info!("run cancelled after {} of {total} jobs", results.len());
                break;
            }
        }
        if current_survey != Some(descriptor.survey) {
            info!("=== {} ===", descriptor.survey.description());
            current_survey = Some(descriptor.survey);
        }

        let result = job::execute(descriptor, &ctx);
        results.push(result.clone());
        sink.job_finished(&ProgressEvent {
            completed: results.len(),
            total,
            last: result,
        });
    }

    let summary = RunSummary {
        results,
        total_jobs: total,
        output_dir: absolute_dir(writer.output_dir()),
    };
    info!("{summary}");
    Ok(summary)
}

/// Absolute form of `dir`, falling back to the path as given when it cannot
/// be resolved. The directory does not have to exist.
fn absolute_dir(dir: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(dir.as_std_path())
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_else(|| dir.to_owned())
}
