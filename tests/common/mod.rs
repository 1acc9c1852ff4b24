use std::collections::HashMap;

use camino::Utf8PathBuf;

use skymatch::catalogs::{CatalogKey, CatalogQueryService, RawTable};
use skymatch::footprints::RegionHint;
use skymatch::skymatch_errors::SkymatchError;

/// Offline stand-in for the remote catalog services: serves canned tables
/// keyed by catalog and simulates outages for selected catalogs.
pub struct MockService {
    tables: HashMap<CatalogKey, RawTable>,
    failing: Vec<CatalogKey>,
}

impl MockService {
    pub fn new() -> MockService {
        MockService {
            tables: HashMap::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_table(mut self, catalog: CatalogKey, table: RawTable) -> MockService {
        self.tables.insert(catalog, table);
        self
    }

    pub fn with_failure(mut self, catalog: CatalogKey) -> MockService {
        self.failing.push(catalog);
        self
    }
}

impl CatalogQueryService for MockService {
    fn query(
        &self,
        catalog: CatalogKey,
        _region: &RegionHint,
        row_limit: usize,
    ) -> Result<RawTable, SkymatchError> {
        if self.failing.contains(&catalog) {
            return Err(std::io::Error::other("simulated connection reset").into());
        }
        let mut table = self.tables.get(&catalog).cloned().unwrap_or_default();
        table.rows.truncate(row_limit);
        Ok(table)
    }
}

pub fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

/// Raw table shaped like a VizieR Abell response.
pub fn abell_table(rows: &[(&str, f64, f64)]) -> RawTable {
    let mut table = RawTable::new(vec!["ACO", "_RA.icrs", "_DE.icrs", "z"]);
    for (i, (name, ra, dec)) in rows.iter().enumerate() {
        table.push_row(vec![
            name.to_string(),
            ra.to_string(),
            dec.to_string(),
            format!("0.{:03}", i + 1),
        ]);
    }
    table
}
