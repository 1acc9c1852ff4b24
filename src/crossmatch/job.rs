//! Execution of a single cross-match job.
//!
//! A job resolves its footprint, fetches raw rows from the catalog
//! boundary (or the custom file loader), normalizes them, keeps the rows
//! the footprint contains and writes the output pair. Every error is
//! converted into the job's own [`JobResult`]; nothing escapes to the
//! caller.

use std::sync::Arc;

use camino::Utf8Path;
use log::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::catalogs::{
    self, custom, CatalogKey, CatalogQueryService, ColumnMap, NormalizedTable, RawTable,
};
use crate::crossmatch::{JobDescriptor, JobResult};
use crate::footprints::{Footprint, HealpixMask};
use crate::output::ResultWriter;
use crate::skymatch_errors::SkymatchError;

/// Everything a job needs besides its descriptor, borrowed from the
/// orchestrator for the duration of a run.
pub(crate) struct JobContext<'a> {
    pub service: &'a dyn CatalogQueryService,
    pub writer: &'a ResultWriter,
    pub row_limit: usize,
    /// When set, stands in for every survey's native footprint.
    pub mask: Option<Arc<HealpixMask>>,
    pub custom_file: Option<&'a Utf8Path>,
    pub custom_ra_col: &'a str,
    pub custom_dec_col: &'a str,
}

/// Run one job to completion.
pub(crate) fn execute(descriptor: JobDescriptor, ctx: &JobContext<'_>) -> JobResult {
    info!("[{descriptor}]");

    let footprint = match &ctx.mask {
        Some(mask) => Footprint::Mask(Arc::clone(mask)),
        None => descriptor.survey.native_footprint(),
    };

    let raw = match fetch_rows(descriptor, ctx) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("[{descriptor}] fetch failed: {err}");
            return JobResult::failure(descriptor, 0, 0, &err);
        }
    };

    let n_queried = raw.len();
    if n_queried == 0 {
        info!("[{descriptor}] no objects retrieved");
        return JobResult::completed(descriptor, 0, 0, 0, None);
    }
    info!("[{descriptor}] retrieved {n_queried} objects");

    let map = match descriptor.catalog {
        CatalogKey::Custom => ColumnMap::custom(ctx.custom_ra_col, ctx.custom_dec_col),
        named => catalogs::column_map(named),
    };
    let mut table = catalogs::normalize_table(descriptor.catalog, &map, &raw);
    let n_dropped = table.dropped;
    if n_dropped > 0 {
        warn!("[{descriptor}] dropped {n_dropped} rows that could not be normalized");
    }

    retain_contained(&mut table, &footprint);
    let n_matched = table.rows.len();
    info!(
        "[{descriptor}] matched within {}: {n_matched}",
        descriptor.survey.file_tag()
    );

    if n_matched == 0 {
        return JobResult::completed(descriptor, n_queried, 0, n_dropped, None);
    }

    match ctx.writer.write(descriptor.survey, descriptor.catalog, &table) {
        Ok(paths) => {
            JobResult::completed(descriptor, n_queried, n_matched, n_dropped, Some(paths))
        }
        Err(err) => {
            warn!("[{descriptor}] could not write outputs: {err}");
            JobResult::failure(descriptor, n_queried, n_dropped, &err)
        }
    }
}

fn fetch_rows(descriptor: JobDescriptor, ctx: &JobContext<'_>) -> Result<RawTable, SkymatchError> {
    if descriptor.catalog == CatalogKey::Custom {
        let Some(path) = ctx.custom_file else {
            return Err(SkymatchError::MissingCustomFile);
        };
        return custom::load_custom(path, ctx.custom_ra_col, ctx.custom_dec_col);
    }
    let region = descriptor.survey.region_hint();
    ctx.service.query(descriptor.catalog, &region, ctx.row_limit)
}

/// Keep the rows the footprint contains, preserving input order.
#[cfg(not(feature = "parallel"))]
fn retain_contained(table: &mut NormalizedTable, footprint: &Footprint) {
    table.rows.retain(|row| footprint.contains(&row.pos));
}

/// Keep the rows the footprint contains, preserving input order. Rows are
/// evaluated independently, so the filter fans out across threads.
#[cfg(feature = "parallel")]
fn retain_contained(table: &mut NormalizedTable, footprint: &Footprint) {
    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_par_iter()
        .filter(|row| footprint.contains(&row.pos))
        .collect();
}

#[cfg(test)]
mod job_test {
    use super::*;

    use camino::Utf8PathBuf;

    use crate::crossmatch::JobStatus;
    use crate::footprints::{RegionHint, SurveyKey};

    /// Returns a fixed table for every query.
    struct FixedService {
        table: RawTable,
    }

    impl CatalogQueryService for FixedService {
        fn query(
            &self,
            _catalog: CatalogKey,
            _region: &RegionHint,
            _row_limit: usize,
        ) -> Result<RawTable, SkymatchError> {
            Ok(self.table.clone())
        }
    }

    struct FailingService;

    impl CatalogQueryService for FailingService {
        fn query(
            &self,
            _catalog: CatalogKey,
            _region: &RegionHint,
            _row_limit: usize,
        ) -> Result<RawTable, SkymatchError> {
            Err(SkymatchError::MalformedMask("boom".to_string()))
        }
    }

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn context<'a>(
        service: &'a dyn CatalogQueryService,
        writer: &'a ResultWriter,
    ) -> JobContext<'a> {
        JobContext {
            service,
            writer,
            row_limit: 1000,
            mask: None,
            custom_file: None,
            custom_ra_col: "RA",
            custom_dec_col: "Dec",
        }
    }

    fn hltds_abell() -> JobDescriptor {
        JobDescriptor {
            survey: SurveyKey::Hltds,
            catalog: CatalogKey::Abell,
        }
    }

    /// Two rows on the ELAIS-N1 field centre, one on EDFS, one far away.
    fn hltds_rows() -> RawTable {
        let mut t = RawTable::new(vec!["ACO", "_RA.icrs", "_DE.icrs", "z"]);
        t.push_row(vec!["1".into(), "242.75".into(), "54.98".into(), "0.1".into()]);
        t.push_row(vec!["2".into(), "243.0".into(), "55.2".into(), "0.2".into()]);
        t.push_row(vec!["3".into(), "59.10".into(), "-49.32".into(), "0.3".into()]);
        t.push_row(vec!["4".into(), "10.0".into(), "10.0".into(), "0.4".into()]);
        t
    }

    #[test]
    fn test_job_matches_and_writes() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);
        let service = FixedService {
            table: hltds_rows(),
        };

        let result = execute(hltds_abell(), &context(&service, &writer));
        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.n_queried, 4);
        assert_eq!(result.n_matched, 3);
        assert_eq!(result.n_dropped, 0);
        let output = result.output.unwrap();
        assert!(output.fits.exists());
        assert!(output.csv.exists());
    }

    #[test]
    fn test_fetch_failure_is_contained() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);

        let result = execute(hltds_abell(), &context(&FailingService, &writer));
        assert_eq!(result.status, JobStatus::Failure);
        assert_eq!(result.n_queried, 0);
        assert!(result.output.is_none());
        assert!(result.error.unwrap().contains("boom"));
    }

    #[test]
    fn test_dropped_rows_mean_partial_failure() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);
        let mut table = hltds_rows();
        table.push_row(vec!["5".into(), "bad".into(), "55.0".into(), "0.5".into()]);
        let service = FixedService { table };

        let result = execute(hltds_abell(), &context(&service, &writer));
        assert_eq!(result.status, JobStatus::PartialFailure);
        assert_eq!(result.n_queried, 5);
        assert_eq!(result.n_matched, 3);
        assert_eq!(result.n_dropped, 1);
        assert!(result.output.is_some());
    }

    #[test]
    fn test_zero_matches_writes_nothing() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(dir.join("never_created"));
        let mut t = RawTable::new(vec!["ACO", "_RA.icrs", "_DE.icrs"]);
        t.push_row(vec!["9".into(), "10.0".into(), "10.0".into()]);
        let service = FixedService { table: t };

        let result = execute(hltds_abell(), &context(&service, &writer));
        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.n_queried, 1);
        assert_eq!(result.n_matched, 0);
        assert!(result.output.is_none());
        assert!(!writer.output_dir().exists());
    }

    #[test]
    fn test_custom_without_file_fails() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);
        let service = FixedService {
            table: RawTable::default(),
        };
        let descriptor = JobDescriptor {
            survey: SurveyKey::Hltds,
            catalog: CatalogKey::Custom,
        };

        let result = execute(descriptor, &context(&service, &writer));
        assert_eq!(result.status, JobStatus::Failure);
        assert!(result
            .error
            .unwrap()
            .contains("no custom catalog file is configured"));
    }

    #[test]
    fn test_custom_file_rows_filtered_by_footprint() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);
        let catalog_path = dir.join("mine.csv");
        std::fs::write(
            &catalog_path,
            "RA,Dec,flux\n242.75,54.98,1.0\n10.0,10.0,2.0\n",
        )
        .unwrap();
        let service = FixedService {
            table: RawTable::default(),
        };

        let mut ctx = context(&service, &writer);
        ctx.custom_file = Some(&catalog_path);
        let descriptor = JobDescriptor {
            survey: SurveyKey::Hltds,
            catalog: CatalogKey::Custom,
        };

        let result = execute(descriptor, &ctx);
        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.n_queried, 2);
        assert_eq!(result.n_matched, 1);
        let output = result.output.unwrap();
        assert!(output.csv.as_str().ends_with("HLTDS_custom_matches.csv"));
    }

    #[test]
    fn test_mask_override_replaces_native_footprint() {
        let (_guard, dir) = tempdir();
        let writer = ResultWriter::new(&dir);
        // Mask with a single active nside=1 pixel: the one containing (0, 0)
        let mask_path = dir.join("mask.fits");
        let mut values = vec![0.0f64; 12];
        values[4] = 1.0;
        let columns = vec![crate::fits::TableColumn::float("WEIGHT", values)];
        let cards = vec![
            crate::fits::Card::string("PIXTYPE", "HEALPIX"),
            crate::fits::Card::string("ORDERING", "RING"),
            crate::fits::Card::integer("NSIDE", 1),
            crate::fits::Card::string("INDXSCHM", "IMPLICIT"),
        ];
        crate::fits::write_table_file(&mask_path, &columns, &cards).unwrap();
        let mask = Arc::new(HealpixMask::load(&mask_path).unwrap());

        // (0, 0) sits in pixel 4; far from any HLTDS cap
        let mut t = RawTable::new(vec!["ACO", "_RA.icrs", "_DE.icrs"]);
        t.push_row(vec!["1".into(), "0.0".into(), "0.0".into()]);
        t.push_row(vec!["2".into(), "242.75".into(), "54.98".into()]);
        let service = FixedService { table: t };

        let mut ctx = context(&service, &writer);
        ctx.mask = Some(mask);

        let result = execute(hltds_abell(), &ctx);
        assert_eq!(result.n_matched, 1);
    }
}
