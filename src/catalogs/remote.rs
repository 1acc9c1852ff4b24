//! HTTP access to the VizieR and NED catalog services.
//!
//! [`RemoteCatalogService`] owns a persistent [`ureq::Agent`] and implements
//! [`CatalogQueryService`] for the built-in remote catalogs:
//!
//! - Abell, 2MASX and NGC are small enough to fetch wholesale from the
//!   VizieR TSV endpoint, capped at the configured row limit.
//! - SDSS photometry is far too large for a wholesale fetch; the sky is
//!   tiled in a 15 x 10 degree grid of cone searches, the tiles are merged,
//!   deduplicated on `objID` and reduced to galaxies (`cl == 3`).
//! - NED is queried with one cone per survey field when the region hint
//!   names cones, and with the same tile grid otherwise, then deduplicated
//!   on `Object Name`.
//!
//! A failed tile is logged and skipped so one flaky response does not void
//! a 288-tile sweep; the request error is surfaced only when every tile
//! failed. Response parsing lives in free functions so it can be tested on
//! canned payloads without touching the network.

use std::time::Duration;

use itertools::iproduct;
use log::{debug, info, warn};
use ureq::Agent;

use crate::catalogs::{CatalogKey, CatalogQueryService, RawTable};
use crate::constants::{Degree, ARCMIN_PER_DEG};
use crate::footprints::RegionHint;
use crate::ref_frames::SkyPosition;
use crate::skymatch_errors::SkymatchError;

const VIZIER_TSV_URL: &str = "https://vizier.cds.unistra.fr/viz-bin/asu-tsv";
const NED_OBJSEARCH_URL: &str = "https://ned.ipac.caltech.edu/cgi-bin/objsearch";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_ATTEMPTS: u32 = 2;

/// All-sky tile grid: RA varies fastest, Dec spans [-80, +30].
const TILE_RA_STEP: Degree = 15.0;
const TILE_DEC_STEP: Degree = 10.0;
const TILE_DEC_MIN: Degree = -80.0;
const TILE_DEC_MAX: Degree = 30.0;
const TILE_RADIUS: Degree = 8.0;

/// VizieR clips SDSS cone searches to this many rows per tile.
const SDSS_TILE_ROWS: usize = 500;

/// Catalog access over HTTP with a shared agent and per-request retry.
#[derive(Debug, Clone)]
pub struct RemoteCatalogService {
    agent: Agent,
    attempts: u32,
}

impl Default for RemoteCatalogService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCatalogService {
    /// Create a service with the default timeout and retry policy.
    pub fn new() -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build();
        let agent: Agent = config.into();

        RemoteCatalogService {
            agent,
            attempts: FETCH_ATTEMPTS,
        }
    }

    /// GET a text body, retrying transient failures.
    fn fetch_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, SkymatchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .agent
                .get(url)
                .query_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
                .call();
            match result {
                Ok(mut response) => return Ok(response.body_mut().read_to_string()?),
                Err(err) if attempt < self.attempts => {
                    warn!("request to {url} failed (attempt {attempt}/{}): {err}", self.attempts);
                }
                Err(err) => return Err(SkymatchError::Transport(err)),
            }
        }
    }

    /// Fetch an entire VizieR catalog up to `row_limit` rows.
    fn fetch_vizier_catalog(
        &self,
        catalog: CatalogKey,
        row_limit: usize,
    ) -> Result<RawTable, SkymatchError> {
        let Some((source, columns)) = catalog.vizier_source() else {
            return Err(SkymatchError::UnknownCatalog(catalog.as_str().to_string()));
        };
        info!("querying VizieR {source} for {}", catalog.description());

        let params = [
            ("-source", source.to_string()),
            ("-out", columns.join(",")),
            ("-out.max", row_limit.to_string()),
        ];
        let body = self.fetch_text(VIZIER_TSV_URL, &params)?;
        Ok(parse_vizier_tsv(&body))
    }

    /// Sweep the SDSS tile grid, merge, deduplicate and keep galaxies.
    fn fetch_sdss_tiles(&self, row_limit: usize) -> Result<RawTable, SkymatchError> {
        let Some((source, columns)) = CatalogKey::Sdss.vizier_source() else {
            return Err(SkymatchError::UnknownCatalog("sdss".to_string()));
        };
        let tiles = tile_centres();
        let per_tile = SDSS_TILE_ROWS.min(row_limit);
        info!("querying VizieR {source} over {} sky tiles", tiles.len());

        let mut combined = RawTable::default();
        let mut fetched = 0usize;
        let mut last_err = None;
        for (queried, (ra, dec)) in tiles.iter().enumerate() {
            let params = [
                ("-source", source.to_string()),
                ("-out", columns.join(",")),
                ("-out.max", per_tile.to_string()),
                ("-c", format!("{ra:.6}{dec:+.6}")),
                ("-c.rd", TILE_RADIUS.to_string()),
            ];
            match self.fetch_text(VIZIER_TSV_URL, &params) {
                Ok(body) => {
                    combined.append(parse_vizier_tsv(&body));
                    fetched += 1;
                }
                Err(err) => {
                    debug!("tile ({ra}, {dec}) skipped: {err}");
                    last_err = Some(err);
                }
            }
            if (queried + 1) % 30 == 0 {
                info!("  {}/{} tiles queried", queried + 1, tiles.len());
            }
        }
        if fetched == 0 {
            if let Some(err) = last_err {
                return Err(err);
            }
        }

        let table = finalize_sdss(combined);
        info!("retrieved {} SDSS galaxies after deduplication", table.len());
        Ok(table)
    }

    /// Query NED with one cone per survey field, or tile the sky when the
    /// region hint gives no cones.
    fn fetch_ned(&self, region: &RegionHint, row_limit: usize) -> Result<RawTable, SkymatchError> {
        let mut combined = RawTable::default();
        match region {
            RegionHint::Cones(cones) => {
                info!("querying NED with {} cone searches", cones.len());
                let mut fetched = 0usize;
                let mut last_err = None;
                for cone in cones {
                    match self.ned_cone(cone.center, cone.radius, row_limit) {
                        Ok(table) => {
                            combined.append(table);
                            fetched += 1;
                        }
                        Err(err) => {
                            warn!("NED cone search at {} failed: {err}", cone.center);
                            last_err = Some(err);
                        }
                    }
                }
                if fetched == 0 {
                    if let Some(err) = last_err {
                        return Err(err);
                    }
                }
            }
            RegionHint::AllSky => {
                let tiles = tile_centres();
                info!("tiling the sky with {} NED cones (15 x 10 degree grid)", tiles.len());
                let mut fetched = 0usize;
                let mut last_err = None;
                for (queried, (ra, dec)) in tiles.iter().enumerate() {
                    match self.ned_cone(SkyPosition::from_validated(*ra, *dec), TILE_RADIUS, row_limit) {
                        Ok(table) => {
                            combined.append(table);
                            fetched += 1;
                        }
                        Err(err) => {
                            debug!("NED tile ({ra}, {dec}) skipped: {err}");
                            last_err = Some(err);
                        }
                    }
                    if (queried + 1) % 20 == 0 {
                        info!("  {}/{} NED tiles queried", queried + 1, tiles.len());
                    }
                }
                if fetched == 0 {
                    if let Some(err) = last_err {
                        return Err(err);
                    }
                }
            }
        }
        combined.dedup_by_column("Object Name");
        Ok(combined)
    }

    fn ned_cone(
        &self,
        center: SkyPosition,
        radius: Degree,
        row_limit: usize,
    ) -> Result<RawTable, SkymatchError> {
        let params = [
            ("search_type", "Near Position Search".to_string()),
            ("in_csys", "Equatorial".to_string()),
            ("in_equinox", "J2000.0".to_string()),
            ("lon", format!("{}d", center.ra())),
            ("lat", format!("{}d", center.dec())),
            ("radius", (radius * ARCMIN_PER_DEG).to_string()),
            ("of", "ascii_bar".to_string()),
        ];
        let body = self.fetch_text(NED_OBJSEARCH_URL, &params)?;
        let mut table = parse_ned_bar(&body);
        table.rows.truncate(row_limit);
        Ok(table)
    }
}

impl CatalogQueryService for RemoteCatalogService {
    fn query(
        &self,
        catalog: CatalogKey,
        region: &RegionHint,
        row_limit: usize,
    ) -> Result<RawTable, SkymatchError> {
        let mut table = match catalog {
            CatalogKey::Abell | CatalogKey::TwoMasx | CatalogKey::Ngc => {
                self.fetch_vizier_catalog(catalog, row_limit)?
            }
            CatalogKey::Sdss => self.fetch_sdss_tiles(row_limit)?,
            CatalogKey::Ned => self.fetch_ned(region, row_limit)?,
            CatalogKey::Custom => return Err(SkymatchError::MissingCustomFile),
        };
        // Merged tile sweeps can overshoot; the limit binds the total
        table.rows.truncate(row_limit);
        Ok(table)
    }
}

/// Centres of the all-sky cone grid, RA varying fastest.
fn tile_centres() -> Vec<(Degree, Degree)> {
    let n_ra = (360.0 / TILE_RA_STEP) as usize;
    let n_dec = ((TILE_DEC_MAX - TILE_DEC_MIN) / TILE_DEC_STEP) as usize + 1;
    iproduct!(0..n_dec, 0..n_ra)
        .map(|(j, i)| {
            (
                i as f64 * TILE_RA_STEP,
                TILE_DEC_MIN + j as f64 * TILE_DEC_STEP,
            )
        })
        .collect()
}

/// Merge step shared by the SDSS tile sweep: deduplicate on `objID` and
/// keep only galaxies (`cl == 3`) when the class column is present.
fn finalize_sdss(mut combined: RawTable) -> RawTable {
    combined.dedup_by_column("objID");
    if let Some(cl) = combined.column_index("cl") {
        combined
            .rows
            .retain(|row| row[cl].trim().parse::<f64>().map_or(false, |v| v == 3.0));
    }
    combined
}

/// Parse a VizieR `asu-tsv` response.
///
/// The payload is comment lines, a tab-separated header, an optional units
/// line, a dashed ruler, then data rows. Anything that does not follow this
/// layout parses as an empty table.
fn parse_vizier_tsv(body: &str) -> RawTable {
    let mut lines = body
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let Some(header) = lines.next() else {
        return RawTable::default();
    };
    let columns = header.split('\t').map(|c| c.trim().to_string()).collect();
    let mut table = RawTable::new(columns);

    let mut past_ruler = false;
    for line in lines {
        if !past_ruler {
            past_ruler = is_ruler(line);
            continue;
        }
        table.push_row(line.split('\t').map(|c| c.trim().to_string()).collect());
    }
    table
}

fn is_ruler(line: &str) -> bool {
    line.split('\t')
        .all(|f| !f.trim().is_empty() && f.trim().chars().all(|c| c == '-'))
}

/// Parse a NED `ascii_bar` response: free-text preamble, then a bar-separated
/// header and data rows.
fn parse_ned_bar(body: &str) -> RawTable {
    let mut table = RawTable::default();
    let mut seen_header = false;
    for line in body.lines() {
        let line = line.trim_end();
        if !line.contains('|') {
            continue;
        }
        let cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
        if seen_header {
            table.push_row(cells);
        } else {
            table = RawTable::new(cells);
            seen_header = true;
        }
    }
    table
}
