//! # Catalog query boundary
//!
//! Everything that produces rows of sky objects lives behind this module:
//! the registry of supported catalogs, the [`CatalogQueryService`] trait the
//! cross-match jobs consume, and the row normalization that turns whatever a
//! service returned into positions the footprint predicates can test.
//!
//! ## Supported catalogs
//!
//! | key      | source                                        |
//! |----------|-----------------------------------------------|
//! | `abell`  | Abell clusters of galaxies (VizieR VII/110A)  |
//! | `sdss`   | SDSS photometric objects DR7 (VizieR II/294)  |
//! | `2masx`  | 2MASS Extended Source Catalog (VizieR VII/233)|
//! | `ngc`    | NGC/IC catalog (VizieR VII/118)               |
//! | `ned`    | NASA/IPAC Extragalactic Database              |
//! | `custom` | user-supplied FITS or CSV file                |
//!
//! The five remote catalogs go through [`CatalogQueryService::query`];
//! `custom` is read locally by [`custom::load_custom`] since no network
//! boundary is involved.

pub mod custom;
pub mod normalize;
pub mod remote;

use std::str::FromStr;

use crate::footprints::RegionHint;
use crate::skymatch_errors::SkymatchError;

pub use normalize::{column_map, normalize_table, ColumnMap, NormalizedRow, NormalizedTable};
pub use remote::RemoteCatalogService;

/// The catalogs this crate knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogKey {
    Abell,
    Sdss,
    TwoMasx,
    Ngc,
    Ned,
    Custom,
}

impl CatalogKey {
    /// Every catalog, in registry order.
    pub const ALL: [CatalogKey; 6] = [
        CatalogKey::Abell,
        CatalogKey::Sdss,
        CatalogKey::TwoMasx,
        CatalogKey::Ngc,
        CatalogKey::Ned,
        CatalogKey::Custom,
    ];

    /// The catalogs an `all` selection expands to. `custom` is excluded
    /// since it needs an explicit file.
    pub const REMOTE: [CatalogKey; 5] = [
        CatalogKey::Abell,
        CatalogKey::Sdss,
        CatalogKey::TwoMasx,
        CatalogKey::Ngc,
        CatalogKey::Ned,
    ];

    /// Lowercase identifier used in configuration and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKey::Abell => "abell",
            CatalogKey::Sdss => "sdss",
            CatalogKey::TwoMasx => "2masx",
            CatalogKey::Ngc => "ngc",
            CatalogKey::Ned => "ned",
            CatalogKey::Custom => "custom",
        }
    }

    /// Tag stamped into the `catalog` column of every normalized row.
    pub fn tag(&self) -> &'static str {
        match self {
            CatalogKey::Abell => "Abell",
            CatalogKey::Sdss => "SDSS",
            CatalogKey::TwoMasx => "2MASX",
            CatalogKey::Ngc => "NGC",
            CatalogKey::Ned => "NED",
            CatalogKey::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CatalogKey::Abell => "Abell Clusters (VizieR VII/110A)",
            CatalogKey::Sdss => "SDSS Photometric Catalog DR7 (VizieR II/294)",
            CatalogKey::TwoMasx => "2MASS Extended Source Catalog (VizieR VII/233)",
            CatalogKey::Ngc => "NGC/IC Catalog (VizieR VII/118)",
            CatalogKey::Ned => "NED, NASA/IPAC Extragalactic Database",
            CatalogKey::Custom => "Custom user file (FITS or CSV)",
        }
    }

    /// VizieR source identifier and column selection, for the catalogs that
    /// are plain VizieR tables.
    pub(crate) fn vizier_source(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            CatalogKey::Abell => Some((
                "VII/110A",
                &["ACO", "_RA.icrs", "_DE.icrs", "z", "Rich", "Dclass"],
            )),
            CatalogKey::Sdss => Some(("II/294", &["objID", "RA_ICRS", "DE_ICRS", "cl", "rmag"])),
            CatalogKey::TwoMasx => Some(("VII/233", &["_2MASX", "RAJ2000", "DEJ2000", "Ktmag"])),
            CatalogKey::Ngc => Some(("VII/118", &["Name", "RAB2000", "DEB2000", "Type", "mag"])),
            CatalogKey::Ned | CatalogKey::Custom => None,
        }
    }
}

impl FromStr for CatalogKey {
    type Err = SkymatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abell" => Ok(CatalogKey::Abell),
            "sdss" => Ok(CatalogKey::Sdss),
            "2masx" => Ok(CatalogKey::TwoMasx),
            "ngc" => Ok(CatalogKey::Ngc),
            "ned" => Ok(CatalogKey::Ned),
            "custom" => Ok(CatalogKey::Custom),
            other => Err(SkymatchError::UnknownCatalog(other.to_string())),
        }
    }
}

impl serde::Serialize for CatalogKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An untyped table of catalog rows, exactly as a service returned them.
///
/// Every row has one string cell per column. Typing happens later, during
/// normalization, so transport and parsing stay independent of catalog
/// schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: Vec<S>) -> RawTable {
        RawTable {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Append another table's rows, matching columns by name. Columns the
    /// other table lacks are filled with empty cells; when this table has no
    /// columns yet it adopts the other's layout wholesale.
    pub fn append(&mut self, other: RawTable) {
        if self.columns.is_empty() {
            *self = other;
            return;
        }
        if self.columns == other.columns {
            self.rows.extend(other.rows);
            return;
        }
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.columns.iter().position(|o| o == c))
            .collect();
        for row in other.rows {
            let mapped = mapping
                .iter()
                .map(|m| m.map(|i| row[i].clone()).unwrap_or_default())
                .collect();
            self.rows.push(mapped);
        }
    }

    /// Keep only the first row for each distinct value of the named column,
    /// reordering rows by that value. No-op when the column is absent.
    pub fn dedup_by_column(&mut self, name: &str) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        self.rows.sort_by(|a, b| a[idx].cmp(&b[idx]));
        self.rows.dedup_by(|a, b| a[idx] == b[idx]);
    }
}

/// The boundary between the cross-match engine and remote catalog services.
///
/// Implementations fetch rows for one catalog, restricted to the given sky
/// region where the underlying service supports it. Failures surface as
/// errors; an empty sky is an empty table, never an error.
pub trait CatalogQueryService: Send + Sync {
    /// Fetch rows for `catalog`.
    ///
    /// Arguments
    /// ---------
    /// * `catalog`: which catalog to query; one of [`CatalogKey::REMOTE`].
    /// * `region`: where the consuming footprint's members can lie. Services
    ///   may query a superset of the region, never a subset.
    /// * `row_limit`: upper bound on rows fetched per service request.
    fn query(
        &self,
        catalog: CatalogKey,
        region: &RegionHint,
        row_limit: usize,
    ) -> Result<RawTable, SkymatchError>;
}
