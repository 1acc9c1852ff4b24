//! Row normalization: from raw catalog tables to validated sky positions.
//!
//! Every catalog names its coordinate and identifier columns differently.
//! A [`ColumnMap`] lists the candidate column names for each canonical
//! field, in preference order, always ending with the canonical name itself
//! so normalizing an already-normalized table is a no-op.
//!
//! Rows whose coordinates cannot be parsed into a valid [`SkyPosition`] are
//! dropped and counted, never silently kept; the count feeds the job's
//! partial-failure reporting.

use log::debug;
use smallvec::{smallvec, SmallVec};

use crate::catalogs::{CatalogKey, RawTable};
use crate::constants::Degree;
use crate::ref_frames::SkyPosition;
use crate::skymatch_errors::SkymatchError;

type Candidates = SmallVec<[&'static str; 4]>;

/// Candidate column names for the canonical fields of one catalog.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    ra: SmallVec<[String; 4]>,
    dec: SmallVec<[String; 4]>,
    id: SmallVec<[String; 4]>,
    /// Prefix prepended to identifier values, e.g. `ACO_` for Abell numbers.
    id_prefix: Option<&'static str>,
}

impl ColumnMap {
    fn from_static(ra: Candidates, dec: Candidates, id: Candidates) -> ColumnMap {
        let own = |v: Candidates| v.into_iter().map(str::to_string).collect();
        ColumnMap {
            ra: own(ra),
            dec: own(dec),
            id: own(id),
            id_prefix: None,
        }
    }

    /// Map for a user-supplied file with explicit coordinate columns.
    pub fn custom(ra_col: &str, dec_col: &str) -> ColumnMap {
        ColumnMap {
            ra: smallvec![ra_col.to_string()],
            dec: smallvec![dec_col.to_string()],
            id: smallvec!["object_id".to_string()],
            id_prefix: None,
        }
    }
}

/// The column map of a built-in catalog.
pub fn column_map(catalog: CatalogKey) -> ColumnMap {
    let map = match catalog {
        CatalogKey::Abell => ColumnMap::from_static(
            smallvec!["_RA.icrs", "RA"],
            smallvec!["_DE.icrs", "Dec"],
            smallvec!["ACO", "object_id"],
        ),
        CatalogKey::Sdss => ColumnMap::from_static(
            smallvec!["RA_ICRS", "RA"],
            smallvec!["DE_ICRS", "Dec"],
            smallvec!["objID", "object_id"],
        ),
        CatalogKey::TwoMasx => ColumnMap::from_static(
            smallvec!["RAJ2000", "RA"],
            smallvec!["DEJ2000", "Dec"],
            smallvec!["_2MASX", "object_id"],
        ),
        CatalogKey::Ngc => ColumnMap::from_static(
            smallvec!["RAB2000", "RA"],
            smallvec!["DEB2000", "Dec"],
            smallvec!["Name", "object_id"],
        ),
        CatalogKey::Ned => ColumnMap::from_static(
            smallvec!["RA(deg,icrs)", "RA", "ra"],
            smallvec!["DEC(deg,icrs)", "DEC", "Dec", "dec"],
            smallvec!["Object Name", "object_id"],
        ),
        CatalogKey::Custom => ColumnMap::custom("RA", "Dec"),
    };
    match catalog {
        CatalogKey::Abell => ColumnMap {
            id_prefix: Some("ACO_"),
            ..map
        },
        _ => map,
    }
}

/// One catalog row with a validated position.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub pos: SkyPosition,
    pub object_id: String,
    /// Values of the preserved original columns, aligned with
    /// [`NormalizedTable::extra_columns`].
    pub extras: Vec<String>,
}

/// A normalized catalog table.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub catalog: CatalogKey,
    /// Original columns carried through, minus the coordinate columns that
    /// became the position and any column shadowing a canonical name.
    pub extra_columns: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    /// Rows discarded because their coordinates were missing or invalid.
    pub dropped: usize,
}

impl NormalizedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize a raw table.
///
/// The first RA and Dec candidates present in the table become the position
/// source; their columns are consumed. The identifier comes from the first
/// id candidate with a non-empty value, prefixed per the map, or is
/// synthesized as `{tag}_{index}` over the surviving rows. All remaining
/// columns are preserved as extras.
///
/// A table with no recognizable coordinate columns normalizes to zero rows
/// with every input row counted as dropped.
pub fn normalize_table(
    catalog: CatalogKey,
    map: &ColumnMap,
    table: &RawTable,
) -> NormalizedTable {
    let ra_idx = map.ra.iter().find_map(|c| table.column_index(c));
    let dec_idx = map.dec.iter().find_map(|c| table.column_index(c));
    let id_idx = map.id.iter().find_map(|c| table.column_index(c));

    let (Some(ra_idx), Some(dec_idx)) = (ra_idx, dec_idx) else {
        debug!(
            "{}: no coordinate columns among {:?}, dropping all {} rows",
            catalog,
            table.columns,
            table.len()
        );
        return NormalizedTable {
            catalog,
            extra_columns: Vec::new(),
            rows: Vec::new(),
            dropped: table.len(),
        };
    };

    let extra_idx: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(i, name)| {
            *i != ra_idx && *i != dec_idx && !matches!(name.as_str(), "catalog" | "object_id")
        })
        .map(|(i, _)| i)
        .collect();
    let extra_columns: Vec<String> = extra_idx
        .iter()
        .map(|i| table.columns[*i].clone())
        .collect();

    let mut rows = Vec::with_capacity(table.len());
    let mut dropped = 0usize;

    for row in &table.rows {
        let pos = match parse_position(&row[ra_idx], &row[dec_idx]) {
            Ok(pos) => pos,
            Err(err) => {
                debug!("{catalog}: dropping row: {err}");
                dropped += 1;
                continue;
            }
        };

        let object_id = id_idx
            .map(|i| row[i].trim())
            .filter(|v| !v.is_empty())
            .map(|v| apply_prefix(map.id_prefix, v))
            .unwrap_or_else(|| format!("{}_{}", catalog.tag(), rows.len()));

        let extras = extra_idx.iter().map(|i| row[*i].clone()).collect();
        rows.push(NormalizedRow {
            pos,
            object_id,
            extras,
        });
    }

    if dropped > 0 {
        debug!("{}: dropped {dropped} rows with unusable coordinates", catalog);
    }

    NormalizedTable {
        catalog,
        extra_columns,
        rows,
        dropped,
    }
}

/// Parse one row's coordinate pair into a validated position.
///
/// Unparsable text maps to [`SkymatchError::UnmappableRow`]; values that
/// parse but lie outside the valid coordinate ranges keep the position
/// validator's own error. Callers recover both by dropping the row.
fn parse_position(ra_raw: &str, dec_raw: &str) -> Result<SkyPosition, SkymatchError> {
    let ra = parse_angle(ra_raw, AngleKind::Ra).ok_or_else(|| {
        SkymatchError::UnmappableRow(format!("unparsable RA '{}'", ra_raw.trim()))
    })?;
    let dec = parse_angle(dec_raw, AngleKind::Dec).ok_or_else(|| {
        SkymatchError::UnmappableRow(format!("unparsable Dec '{}'", dec_raw.trim()))
    })?;
    SkyPosition::new(ra, dec)
}

fn apply_prefix(prefix: Option<&'static str>, value: &str) -> String {
    match prefix {
        Some(p) if !value.starts_with(p) => format!("{p}{value}"),
        _ => value.to_string(),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum AngleKind {
    Ra,
    Dec,
}

/// Parse a coordinate cell into decimal degrees.
///
/// Plain numbers are degrees. Sexagesimal values with two or three fields
/// are hours for RA and signed degrees for Dec, the conventions of the
/// catalogs that still publish `hh mm ss` positions.
fn parse_angle(raw: &str, kind: AngleKind) -> Option<Degree> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    let spaced = trimmed.replace(':', " ");
    let parts: Vec<&str> = spaced.split_whitespace().collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let sign = if parts[0].starts_with('-') { -1.0 } else { 1.0 };
    let lead: f64 = parts[0].trim_start_matches(['-', '+']).parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = match parts.get(2) {
        Some(p) => p.parse().ok()?,
        None => 0.0,
    };

    let magnitude = lead + minutes / 60.0 + seconds / 3600.0;
    Some(match kind {
        AngleKind::Ra => magnitude * 15.0,
        AngleKind::Dec => sign * magnitude,
    })
}
