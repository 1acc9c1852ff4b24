use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8Path;

use skymatch::catalogs::{CatalogKey, RawTable};
use skymatch::crossmatch::{
    ChannelProgress, JobStatus, NullProgress, ProgressEvent, ProgressSink, RunOptions,
};
use skymatch::footprints::SurveyKey;
use skymatch::skymatch::Skymatch;

mod common;
use common::{abell_table, tempdir, MockService};

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn options(output_dir: &Utf8Path, surveys: &[&str], catalogs: &[&str]) -> RunOptions {
    RunOptions {
        surveys: names(surveys),
        catalogs: names(catalogs),
        output_dir: output_dir.to_owned(),
        ..RunOptions::default()
    }
}

/// Raw table shaped like a NED position search response.
fn ned_table(rows: &[(&str, f64, f64)]) -> RawTable {
    let mut table = RawTable::new(vec!["No.", "Object Name", "RA(deg,icrs)", "DEC(deg,icrs)"]);
    for (i, (name, ra, dec)) in rows.iter().enumerate() {
        table.push_row(vec![
            (i + 1).to_string(),
            name.to_string(),
            ra.to_string(),
            dec.to_string(),
        ]);
    }
    table
}

#[test]
fn test_one_failing_job_does_not_stop_the_run() {
    let (_guard, dir) = tempdir();
    let out = dir.join("out");
    let service = MockService::new()
        .with_table(CatalogKey::Abell, abell_table(&[("2151", 242.75, 54.98)]))
        .with_failure(CatalogKey::Ngc)
        .with_table(CatalogKey::Ned, ned_table(&[("MESSIER 101", 59.10, -49.32)]));

    let opts = options(&out, &["hltds"], &["abell", "ngc", "ned"]);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.results[0].status, JobStatus::Success);
    assert_eq!(summary.results[1].status, JobStatus::Failure);
    assert_eq!(summary.results[2].status, JobStatus::Success);

    assert!(summary.results[0].output.is_some());
    assert!(summary.results[1].output.is_none());
    assert!(summary.results[2].output.is_some());
    assert!(summary.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("connection reset"));

    assert!(out.join("HLTDS_abell_matches.csv").exists());
    assert!(out.join("HLTDS_ned_matches.csv").exists());
    assert!(!out.join("HLTDS_ngc_matches.csv").exists());
    assert!(!out.join("HLTDS_ngc_matches.fits").exists());

    assert_eq!(summary.total_matched(), 2);
    assert_eq!(summary.failures().count(), 1);
    assert!(!summary.cancelled());
}

#[test]
fn test_results_follow_enumeration_order() {
    let (_guard, dir) = tempdir();
    let service = MockService::new();

    let opts = options(&dir.join("out"), &["hltds", "gbtds"], &["abell", "ngc"]);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    let order: Vec<(SurveyKey, CatalogKey)> = summary
        .results
        .iter()
        .map(|r| (r.survey, r.catalog))
        .collect();
    assert_eq!(
        order,
        vec![
            (SurveyKey::Hltds, CatalogKey::Abell),
            (SurveyKey::Hltds, CatalogKey::Ngc),
            (SurveyKey::Gbtds, CatalogKey::Abell),
            (SurveyKey::Gbtds, CatalogKey::Ngc),
        ]
    );
}

#[test]
fn test_all_expands_and_duplicates_collapse() {
    let (_guard, dir) = tempdir();
    let service = MockService::new();

    let opts = options(&dir.join("out"), &["all", "hlwas"], &["ngc", "ngc"]);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    assert_eq!(summary.total_jobs, 3);
    let surveys: Vec<SurveyKey> = summary.results.iter().map(|r| r.survey).collect();
    assert_eq!(
        surveys,
        vec![SurveyKey::Hlwas, SurveyKey::Hltds, SurveyKey::Gbtds]
    );
    assert!(summary.results.iter().all(|r| r.catalog == CatalogKey::Ngc));
}

#[test]
fn test_progress_events_count_up() {
    let (_guard, dir) = tempdir();
    let service = MockService::new()
        .with_table(CatalogKey::Abell, abell_table(&[("2151", 242.75, 54.98)]))
        .with_failure(CatalogKey::Ngc);

    let opts = options(&dir.join("out"), &["hltds"], &["abell", "ngc", "ned"]);
    let (sink, rx) = ChannelProgress::new();
    Skymatch::run_with_service(&service, &opts, &sink, None).unwrap();
    drop(sink);

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert_eq!(events.len(), 3);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.completed, i + 1);
        assert_eq!(event.total, 3);
    }
    let catalogs: Vec<CatalogKey> = events.iter().map(|e| e.last.catalog).collect();
    assert_eq!(
        catalogs,
        vec![CatalogKey::Abell, CatalogKey::Ngc, CatalogKey::Ned]
    );
}

#[test]
fn test_preset_cancel_runs_nothing() {
    let (_guard, dir) = tempdir();
    let out = dir.join("out");
    let service =
        MockService::new().with_table(CatalogKey::Abell, abell_table(&[("2151", 242.75, 54.98)]));

    let opts = options(&out, &["hltds"], &["abell", "ngc"]);
    let cancel = AtomicBool::new(true);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, Some(&cancel)).unwrap();

    assert_eq!(summary.results.len(), 0);
    assert_eq!(summary.total_jobs, 2);
    assert!(summary.cancelled());
    assert_eq!(summary.total_matched(), 0);
    assert!(!out.exists());
}

struct CancelAfterFirst<'a> {
    flag: &'a AtomicBool,
}

impl ProgressSink for CancelAfterFirst<'_> {
    fn job_finished(&self, _event: &ProgressEvent) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_cancel_between_jobs_keeps_completed_prefix() {
    let (_guard, dir) = tempdir();
    let out = dir.join("out");
    let service =
        MockService::new().with_table(CatalogKey::Abell, abell_table(&[("2151", 242.75, 54.98)]));

    let opts = options(&out, &["hltds"], &["abell", "ngc"]);
    let cancel = AtomicBool::new(false);
    let sink = CancelAfterFirst { flag: &cancel };
    let summary = Skymatch::run_with_service(&service, &opts, &sink, Some(&cancel)).unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].catalog, CatalogKey::Abell);
    assert!(summary.cancelled());
    // the completed job's output survives the cancellation
    assert!(out.join("HLTDS_abell_matches.csv").exists());
    assert!(!out.join("HLTDS_ngc_matches.csv").exists());
}

#[test]
fn test_identical_runs_produce_identical_files() {
    let (_guard, dir) = tempdir();
    let rows = [
        ("2151", 242.75, 54.98),
        ("2152", 243.1, 55.3),
        ("86", 59.5, -49.0),
    ];
    let service = MockService::new().with_table(CatalogKey::Abell, abell_table(&rows));

    let out1 = dir.join("first");
    let out2 = dir.join("second");
    Skymatch::run_with_service(
        &service,
        &options(&out1, &["hltds"], &["abell"]),
        &NullProgress,
        None,
    )
    .unwrap();
    Skymatch::run_with_service(
        &service,
        &options(&out2, &["hltds"], &["abell"]),
        &NullProgress,
        None,
    )
    .unwrap();

    let csv1 = std::fs::read(out1.join("HLTDS_abell_matches.csv")).unwrap();
    let csv2 = std::fs::read(out2.join("HLTDS_abell_matches.csv")).unwrap();
    assert_eq!(csv1, csv2);

    let fits1 = std::fs::read(out1.join("HLTDS_abell_matches.fits")).unwrap();
    let fits2 = std::fs::read(out2.join("HLTDS_abell_matches.fits")).unwrap();
    assert_eq!(fits1, fits2);
}

#[test]
fn test_zero_matches_creates_no_output() {
    let (_guard, dir) = tempdir();
    let out = dir.join("out");
    let service =
        MockService::new().with_table(CatalogKey::Abell, abell_table(&[("99", 10.0, 10.0)]));

    let opts = options(&out, &["hltds"], &["abell"]);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    assert_eq!(summary.results[0].status, JobStatus::Success);
    assert_eq!(summary.results[0].n_queried, 1);
    assert_eq!(summary.results[0].n_matched, 0);
    assert!(summary.results[0].output.is_none());
    assert!(!out.exists());
}

#[test]
fn test_dropped_rows_surface_as_partial_failure() {
    let (_guard, dir) = tempdir();
    let out = dir.join("out");
    // the second row has no RA and cannot be normalized
    let mut table = RawTable::new(vec!["ACO", "_RA.icrs", "_DE.icrs", "z"]);
    table.push_row(vec![
        "2151".into(),
        "242.75".into(),
        "54.98".into(),
        "0.037".into(),
    ]);
    table.push_row(vec!["2152".into(), "".into(), "54.98".into(), "0.038".into()]);
    table.push_row(vec![
        "2153".into(),
        "59.1".into(),
        "-49.32".into(),
        "0.012".into(),
    ]);
    let service = MockService::new().with_table(CatalogKey::Abell, table);

    let opts = options(&out, &["hltds"], &["abell"]);
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    let result = &summary.results[0];
    assert_eq!(result.status, JobStatus::PartialFailure);
    assert_eq!(result.n_queried, 3);
    assert_eq!(result.n_dropped, 1);
    assert_eq!(result.n_matched, 2);
    assert!(result.error.is_none());

    // the surviving rows are still written
    let csv = std::fs::read_to_string(out.join("HLTDS_abell_matches.csv")).unwrap();
    assert!(csv.contains("ACO_2151"));
    assert!(csv.contains("ACO_2153"));
    assert!(!csv.contains("2152"));
}

#[test]
fn test_row_limit_reaches_the_service() {
    let (_guard, dir) = tempdir();
    let rows = [
        ("1", 242.75, 54.98),
        ("2", 242.8, 55.0),
        ("3", 242.9, 55.1),
        ("4", 243.0, 55.2),
        ("5", 243.1, 55.3),
    ];
    let service = MockService::new().with_table(CatalogKey::Abell, abell_table(&rows));

    let mut opts = options(&dir.join("out"), &["hltds"], &["abell"]);
    opts.row_limit = 2;
    let summary = Skymatch::run_with_service(&service, &opts, &NullProgress, None).unwrap();

    assert_eq!(summary.results[0].n_queried, 2);
    assert_eq!(summary.results[0].n_matched, 2);
}
