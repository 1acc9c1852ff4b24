//! # Survey footprints
//!
//! The supported surveys and the membership predicates for their sky
//! coverage. Three footprint geometries exist:
//!
//! - analytic latitude/declination cuts for the wide-area survey,
//! - unions of circular caps for the pointed time-domain surveys,
//! - HEALPix pixel masks loaded from FITS, which can stand in for any
//!   survey's native geometry ([`healpix_mask::HealpixMask`]).
//!
//! A footprint answers one question, [`Footprint::contains`], and it answers
//! it infallibly: positions are validated at construction and masks at load
//! time, so the hot evaluation loop never branches on errors.
//!
//! Footprints also advertise a [`RegionHint`] describing where on the sky
//! their members can possibly lie, which the catalog boundary uses to keep
//! remote queries proportionate to the survey area.

pub mod healpix_mask;

use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{
    Degree, GBTDS_FIELD_RADIUS, GBTDS_POINTINGS, HLTDS_FIELDS, HLTDS_FIELD_RADIUS,
    HLWAS_DEC_MAX, HLWAS_ECL_LAT_MIN, HLWAS_GAL_LAT_MIN,
};
use crate::ref_frames::{angular_separation, galactic_to_equatorial, SkyPosition};
use crate::skymatch_errors::SkymatchError;

pub use healpix_mask::HealpixMask;

/// The surveys whose footprints this crate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurveyKey {
    /// High-Latitude Wide-Area Survey: analytic latitude and declination cuts.
    Hlwas,
    /// High-Latitude Time-Domain Survey: two deep fields.
    Hltds,
    /// Galactic Bulge Time-Domain Survey: six bulge pointings.
    Gbtds,
}

impl SurveyKey {
    /// Every supported survey, in enumeration order.
    pub const ALL: [SurveyKey; 3] = [SurveyKey::Hlwas, SurveyKey::Hltds, SurveyKey::Gbtds];

    /// Lowercase identifier used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyKey::Hlwas => "hlwas",
            SurveyKey::Hltds => "hltds",
            SurveyKey::Gbtds => "gbtds",
        }
    }

    /// Uppercase tag used in output file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            SurveyKey::Hlwas => "HLWAS",
            SurveyKey::Hltds => "HLTDS",
            SurveyKey::Gbtds => "GBTDS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SurveyKey::Hlwas => "High Latitude Wide Area Survey (~5,000 deg2)",
            SurveyKey::Hltds => "High Latitude Time Domain Survey (~18 deg2, 2 fields)",
            SurveyKey::Gbtds => "Galactic Bulge Time Domain Survey (~2 deg2, 6 pointings)",
        }
    }

    /// The survey's built-in footprint geometry.
    pub fn native_footprint(&self) -> Footprint {
        match self {
            SurveyKey::Hlwas => Footprint::SkyCuts(SkyCutRules {
                gal_lat_min: HLWAS_GAL_LAT_MIN,
                ecl_lat_min: HLWAS_ECL_LAT_MIN,
                dec_max: HLWAS_DEC_MAX,
            }),
            SurveyKey::Hltds => Footprint::Caps(
                HLTDS_FIELDS
                    .iter()
                    .map(|(name, ra, dec)| CapField {
                        name: (*name).to_string(),
                        center: SkyPosition::from_validated(*ra, *dec),
                        radius: HLTDS_FIELD_RADIUS,
                    })
                    .collect(),
            ),
            SurveyKey::Gbtds => Footprint::Caps(
                GBTDS_POINTINGS
                    .iter()
                    .enumerate()
                    .map(|(i, (l, b))| CapField {
                        name: format!("GBTDS Field {} (l={l:.3}, b={b:.3})", i + 1),
                        center: galactic_to_equatorial(*l, *b),
                        radius: GBTDS_FIELD_RADIUS,
                    })
                    .collect(),
            ),
        }
    }

    /// Sky region the survey's members can lie in, independent of whether a
    /// mask override replaces the membership predicate.
    pub fn region_hint(&self) -> RegionHint {
        match self.native_footprint() {
            Footprint::SkyCuts(_) => RegionHint::AllSky,
            Footprint::Caps(fields) => RegionHint::Cones(
                fields
                    .iter()
                    .map(|f| Cone {
                        center: f.center,
                        radius: f.radius,
                    })
                    .collect(),
            ),
            Footprint::Mask(_) => RegionHint::AllSky,
        }
    }
}

impl FromStr for SurveyKey {
    type Err = SkymatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hlwas" => Ok(SurveyKey::Hlwas),
            "hltds" => Ok(SurveyKey::Hltds),
            "gbtds" => Ok(SurveyKey::Gbtds),
            other => Err(SkymatchError::UnknownSurvey(other.to_string())),
        }
    }
}

impl serde::Serialize for SurveyKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for SurveyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds of an analytic wide-area footprint.
///
/// The membership predicate is shared; a new analytic footprint is declared
/// by a new set of thresholds, never by a new code path.
#[derive(Debug, Clone, Copy)]
pub struct SkyCutRules {
    /// Minimum absolute galactic latitude in degrees.
    pub gal_lat_min: Degree,
    /// Minimum absolute ecliptic latitude in degrees.
    pub ecl_lat_min: Degree,
    /// Maximum declination in degrees.
    pub dec_max: Degree,
}

/// One circular field of a pointed survey.
#[derive(Debug, Clone)]
pub struct CapField {
    pub name: String,
    pub center: SkyPosition,
    /// Cap radius in degrees; membership is inclusive at the rim.
    pub radius: Degree,
}

/// A cone on the sky, the unit in which query regions are described.
#[derive(Debug, Clone, Copy)]
pub struct Cone {
    pub center: SkyPosition,
    pub radius: Degree,
}

/// Where a footprint's members can possibly lie.
#[derive(Debug, Clone)]
pub enum RegionHint {
    /// No useful restriction; the catalog boundary queries its full area.
    AllSky,
    /// Members lie within at least one of these cones.
    Cones(Vec<Cone>),
}

/// A sky-coverage membership predicate.
#[derive(Debug, Clone)]
pub enum Footprint {
    /// Wide-area cuts: far enough from both the galactic and ecliptic
    /// planes, and south of the declination limit.
    SkyCuts(SkyCutRules),
    /// Union of circular fields.
    Caps(Vec<CapField>),
    /// Explicit HEALPix pixel mask.
    Mask(Arc<HealpixMask>),
}

impl Footprint {
    /// Whether the position lies inside the footprint.
    ///
    /// All comparisons are inclusive: a position exactly on a cut threshold
    /// or a cap rim is a member.
    pub fn contains(&self, pos: &SkyPosition) -> bool {
        match self {
            Footprint::SkyCuts(rules) => {
                let (_, gal_b) = pos.to_galactic();
                let (_, ecl_lat) = pos.to_ecliptic();
                gal_b.abs() >= rules.gal_lat_min
                    && ecl_lat.abs() >= rules.ecl_lat_min
                    && pos.dec() <= rules.dec_max
            }
            Footprint::Caps(fields) => fields
                .iter()
                .any(|f| angular_separation(&f.center, pos) <= f.radius),
            Footprint::Mask(mask) => mask.contains(pos),
        }
    }
}

impl std::fmt::Display for Footprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Footprint::SkyCuts(_) => write!(f, "analytic sky cuts"),
            Footprint::Caps(fields) => write!(f, "{} circular fields", fields.len()),
            Footprint::Mask(mask) => write!(
                f,
                "HEALPix mask (nside={}, {})",
                mask.nside(),
                mask.ordering()
            ),
        }
    }
}
