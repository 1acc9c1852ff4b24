//! # Constants and type definitions for skymatch
//!
//! This module centralizes the **angular constants**, **conversion factors**, and **common type
//! definitions** used throughout the `skymatch` library, together with the reference values
//! pinning the coordinate frames and survey footprints.
//!
//! ## Overview
//!
//! - Unit conversions (degrees ↔ radians, hours ↔ degrees)
//! - Core type aliases used across the crate
//! - ICRS orientation of the galactic frame (IAU/Hipparcos values)
//! - Survey footprint threshold and field-centre constants
//!
//! These definitions are used by all main modules, including the frame conversions,
//! the footprint registry, and the HEALPix pixelization.

// -------------------------------------------------------------------------------------------------
// Angular constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Hours of right ascension → degrees
pub const DEGH: f64 = 15.0;

/// Degrees → arcminutes
pub const ARCMIN_PER_DEG: f64 = 60.0;

// -------------------------------------------------------------------------------------------------
// Galactic frame orientation (J2000/ICRS, Hipparcos vol. 1 §1.5)
// -------------------------------------------------------------------------------------------------

/// Right ascension of the galactic north pole, degrees
pub const GAL_POLE_RA: f64 = 192.85948;

/// Declination of the galactic north pole, degrees
pub const GAL_POLE_DEC: f64 = 27.12825;

/// Galactic longitude of the ascending node of the galactic plane, degrees
pub const GAL_LON_NODE: f64 = 32.93192;

// -------------------------------------------------------------------------------------------------
// Survey footprint constants (ROTAC Final Report, April 2025)
// -------------------------------------------------------------------------------------------------

/// Wide-area survey: minimum |galactic latitude|, degrees
pub const HLWAS_GAL_LAT_MIN: f64 = 20.0;

/// Wide-area survey: minimum |ecliptic latitude|, degrees
pub const HLWAS_ECL_LAT_MIN: f64 = 15.0;

/// Wide-area survey: maximum declination, degrees
pub const HLWAS_DEC_MAX: f64 = 30.0;

/// Time-domain survey: cap radius around each deep field, degrees
pub const HLTDS_FIELD_RADIUS: f64 = 2.4;

/// Time-domain deep fields, ICRS (RA, Dec) in degrees
pub const HLTDS_FIELDS: [(&str, f64, f64); 2] = [
    ("ELAIS-N1 (North)", 242.75, 54.98),
    ("EDFS (South)", 59.10, -49.32),
];

/// Bulge survey: cap radius around each pointing, slightly larger than the
/// WFI field of view to allow dither overlap, degrees
pub const GBTDS_FIELD_RADIUS: f64 = 0.30;

/// Bulge survey pointing centres in galactic (l, b), degrees
pub const GBTDS_POINTINGS: [(f64, f64); 6] = [
    (-0.418, -1.200),
    (-0.009, -1.200),
    (0.400, -1.200),
    (0.809, -1.200),
    (1.218, -1.200),
    (0.000, -0.125),
];

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcminutes
pub type ArcMin = f64;
/// Angle in radians
pub type Radian = f64;
