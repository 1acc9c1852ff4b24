//! # Skymatch: surveys, catalogs, and cross-match runs
//!
//! This module defines the [`Skymatch`] struct, the façade that wires together:
//!
//! 1. **Catalog access** ([`RemoteCatalogService`](crate::catalogs::RemoteCatalogService)) —
//!    VizieR and NED queries over a shared HTTP agent.
//! 2. **Run orchestration** ([`orchestrator::run`](crate::crossmatch::orchestrator::run)) —
//!    selection expansion into (survey, catalog) jobs, sequential execution with
//!    failure isolation, output staging.
//! 3. **Progress reporting** — pluggable [`ProgressSink`](crate::crossmatch::ProgressSink)
//!    implementations and cooperative cancellation between jobs.
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use skymatch::crossmatch::RunOptions;
//! use skymatch::skymatch::Skymatch;
//!
//! let engine = Skymatch::new();
//!
//! let opts = RunOptions::builder()
//!     .surveys(["hltds"])
//!     .catalogs(["abell", "ned"])
//!     .row_limit(50_000)
//!     .build()
//!     .unwrap();
//!
//! let summary = engine.run(&opts).unwrap();
//! println!("{summary:#}");
//! ```
//!
//! ## See also
//! ------------
//! * [`RunOptions`](crate::crossmatch::RunOptions) – Run configuration and its defaults.
//! * [`RunSummary`](crate::crossmatch::RunSummary) – Per-job results and totals.
//! * [`CatalogQueryService`](crate::catalogs::CatalogQueryService) – Boundary trait for
//!   catalog access, replaceable in tests.

use std::sync::atomic::AtomicBool;

use crate::catalogs::{CatalogQueryService, RemoteCatalogService};
use crate::crossmatch::{orchestrator, NullProgress, ProgressSink, RunOptions, RunSummary};
use crate::skymatch_errors::SkymatchError;

#[derive(Debug, Clone, Default)]
pub struct Skymatch {
    service: RemoteCatalogService,
}

impl Skymatch {
    /// Construct a new [`Skymatch`] context with its own HTTP agent.
    pub fn new() -> Self {
        Skymatch {
            service: RemoteCatalogService::new(),
        }
    }

    /// Execute a cross-match run without progress reporting.
    ///
    /// Arguments
    /// -----------------
    /// * `opts`: Run configuration.
    ///
    /// Return
    /// ----------
    /// * The [`RunSummary`], or the configuration error that prevented the
    ///   run from starting. Job failures do not surface here; they are
    ///   recorded per job in the summary.
    pub fn run(&self, opts: &RunOptions) -> Result<RunSummary, SkymatchError> {
        orchestrator::run(&self.service, opts, &NullProgress, None)
    }

    /// Execute a run, delivering one event to `sink` after each finished job.
    pub fn run_with_progress(
        &self,
        opts: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, SkymatchError> {
        orchestrator::run(&self.service, opts, sink, None)
    }

    /// Execute a run that can be stopped between jobs.
    ///
    /// Arguments
    /// -----------------
    /// * `opts`: Run configuration.
    /// * `sink`: Receives one event after each finished job.
    /// * `cancel`: Polled before each job starts; once set, the run stops and
    ///   the summary covers the completed prefix.
    pub fn run_with_cancel(
        &self,
        opts: &RunOptions,
        sink: &dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<RunSummary, SkymatchError> {
        orchestrator::run(&self.service, opts, sink, Some(cancel))
    }

    /// Execute a run against an arbitrary catalog boundary.
    ///
    /// This is the seam for offline runs: any [`CatalogQueryService`]
    /// implementation stands in for the remote services.
    pub fn run_with_service(
        service: &dyn CatalogQueryService,
        opts: &RunOptions,
        sink: &dyn ProgressSink,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunSummary, SkymatchError> {
        orchestrator::run(service, opts, sink, cancel)
    }
}
