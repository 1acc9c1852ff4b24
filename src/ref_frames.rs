//! # Celestial reference frames
//!
//! Conversions between the equatorial (ICRS), galactic, and ecliptic frames,
//! plus the validated [`SkyPosition`] value type and the angular separation
//! used by every footprint predicate.
//!
//! ## Overview
//!
//! - [`SkyPosition`] — an immutable (RA, Dec) pair in degrees, validated at
//!   construction so every downstream predicate stays infallible.
//! - [`SkyPosition::to_galactic`] / [`SkyPosition::to_ecliptic`] — latitude
//!   and longitude in the rotated frames, built from fixed rotation matrices.
//! - [`galactic_to_equatorial`] — the inverse galactic rotation, used to
//!   place survey pointings declared in galactic coordinates.
//! - [`angular_separation`] — great-circle distance in degrees, stable at
//!   the poles and across the RA wrap at 0°/360°.
//!
//! ## Conventions
//!
//! All public angles are **degrees**. The galactic frame follows the
//! IAU/Hipparcos orientation (pole at RA 192.85948°, Dec +27.12825°, node at
//! galactic longitude 32.93192°); the ecliptic frame uses the J2000 mean
//! obliquity from the IAU 1976 polynomial. Matrices are composed once from
//! principal-axis rotations and cached.

use std::sync::LazyLock;

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::constants::{
    Degree, Radian, DPI, GAL_LON_NODE, GAL_POLE_DEC, GAL_POLE_RA, RADEG, RADSEC,
};
use crate::skymatch_errors::SkymatchError;

/// A validated sky position in the equatorial (ICRS) frame.
///
/// Right ascension is reduced into `[0, 360)` at construction; declination
/// must lie in `[-90, 90]`. Non-finite input is rejected, so membership
/// predicates never have to re-check their input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    ra: Degree,
    dec: Degree,
}

impl SkyPosition {
    /// Build a sky position from equatorial coordinates in degrees.
    ///
    /// Arguments
    /// ---------
    /// * `ra`: right ascension in degrees (any finite value, reduced mod 360).
    /// * `dec`: declination in degrees, in `[-90, 90]`.
    ///
    /// Return
    /// ------
    /// * The validated position, or [`SkymatchError::InvalidPosition`] when a
    ///   coordinate is NaN, infinite, or the declination is out of range.
    pub fn new(ra: Degree, dec: Degree) -> Result<SkyPosition, SkymatchError> {
        if !ra.is_finite() || !dec.is_finite() || !(-90.0..=90.0).contains(&dec) {
            return Err(SkymatchError::InvalidPosition { ra, dec });
        }
        Ok(SkyPosition {
            ra: ra.rem_euclid(360.0),
            dec,
        })
    }

    /// Construct from coordinates already known to satisfy the invariants,
    /// for the survey field tables declared as literals in this crate.
    pub(crate) fn from_validated(ra: Degree, dec: Degree) -> SkyPosition {
        debug_assert!((0.0..360.0).contains(&ra) && (-90.0..=90.0).contains(&dec));
        SkyPosition { ra, dec }
    }

    /// Right ascension in degrees, in `[0, 360)`.
    pub fn ra(&self) -> Degree {
        self.ra
    }

    /// Declination in degrees, in `[-90, 90]`.
    pub fn dec(&self) -> Degree {
        self.dec
    }

    /// Convert to galactic coordinates.
    ///
    /// Return
    /// ------
    /// * `(l, b)`: galactic longitude in `[0, 360)` and latitude in
    ///   `[-90, 90]`, degrees.
    pub fn to_galactic(&self) -> (Degree, Degree) {
        vector_to_lonlat(*EQU_TO_GAL * self.unit_vector())
    }

    /// Convert to ecliptic coordinates (J2000 mean obliquity).
    ///
    /// Return
    /// ------
    /// * `(lambda, beta)`: ecliptic longitude in `[0, 360)` and latitude in
    ///   `[-90, 90]`, degrees.
    pub fn to_ecliptic(&self) -> (Degree, Degree) {
        vector_to_lonlat(*EQU_TO_ECL * self.unit_vector())
    }

    /// Unit vector of this position in the equatorial frame.
    pub(crate) fn unit_vector(&self) -> Vector3<f64> {
        let ra = self.ra * RADEG;
        let dec = self.dec * RADEG;
        let (sin_ra, cos_ra) = ra.sin_cos();
        let (sin_dec, cos_dec) = dec.sin_cos();
        Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
    }
}

impl std::fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(ra={:.6}, dec={:+.6})", self.ra, self.dec)
    }
}

/// Convert galactic coordinates to an equatorial position.
///
/// Used by the footprint registry for surveys whose pointing centres are
/// declared in galactic (l, b).
///
/// Arguments
/// ---------
/// * `l`: galactic longitude in degrees.
/// * `b`: galactic latitude in degrees.
///
/// Return
/// ------
/// * The equivalent [`SkyPosition`] in the equatorial frame.
pub fn galactic_to_equatorial(l: Degree, b: Degree) -> SkyPosition {
    let lon = l * RADEG;
    let lat = b * RADEG;
    let (sin_l, cos_l) = lon.sin_cos();
    let (sin_b, cos_b) = lat.sin_cos();
    let v_gal = Vector3::new(cos_b * cos_l, cos_b * sin_l, sin_b);
    let (ra, dec) = vector_to_lonlat(EQU_TO_GAL.transpose() * v_gal);
    // The rotation of a unit vector stays on the sphere, so this cannot fail.
    SkyPosition { ra, dec }
}

/// Angular separation between two sky positions, in degrees.
///
/// Uses the Vincenty formula, which stays numerically stable for very small
/// separations, at the poles, and for near-antipodal pairs, and is immune to
/// the RA discontinuity at 0°/360°.
///
/// Arguments
/// ---------
/// * `a`, `b`: the two positions.
///
/// Return
/// ------
/// * Great-circle separation in `[0, 180]` degrees.
pub fn angular_separation(a: &SkyPosition, b: &SkyPosition) -> Degree {
    let dec1 = a.dec * RADEG;
    let dec2 = b.dec * RADEG;
    let dra = (b.ra - a.ra) * RADEG;

    let (sin_dec1, cos_dec1) = dec1.sin_cos();
    let (sin_dec2, cos_dec2) = dec2.sin_cos();
    let (sin_dra, cos_dra) = dra.sin_cos();

    let num1 = cos_dec2 * sin_dra;
    let num2 = cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_dra;
    let den = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_dra;

    num1.hypot(num2).atan2(den) / RADEG
}

/// Mean obliquity of the ecliptic at J2000 (IAU 1976 model), in radians.
///
/// Leading coefficient of the IAU 1976 polynomial; the time-dependent terms
/// vanish at the reference epoch.
pub(crate) fn obliquity_j2000() -> Radian {
    ((23.0 * 3600.0 + 26.0 * 60.0) + 21.448) * RADSEC
}

/// Right-handed active rotation matrix around one of the principal axes.
///
/// Arguments
/// ---------
/// * `alpha`: rotation angle in radians (positive = trigonometric sense).
/// * `k`: axis index, `0` → X, `1` → Y, `2` → Z.
///
/// Return
/// ------
/// * An orthonormal matrix `R` such that the rotated vector is `x' = R · x`.
///
/// Panics
/// ------
/// * If `k > 2`.
fn rotmt(alpha: Radian, k: usize) -> Matrix3<f64> {
    let axis = match k {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        2 => Vector3::z_axis(),
        _ => panic!("**** ROTMT: invalid axis index {k} (must be 0,1,2) ****"),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// ICRS → galactic component rotation.
///
/// Composition of three principal rotations through the node of the galactic
/// plane: `Rz(l_node) · Rx(dec_pole - 90°) · Rz(-(ra_pole + 90°))`, each as an
/// active rotation so the product maps equatorial components to galactic
/// components. Pinned against the published Hipparcos matrix in the tests.
static EQU_TO_GAL: LazyLock<Matrix3<f64>> = LazyLock::new(|| {
    rotmt(GAL_LON_NODE * RADEG, 2)
        * rotmt((GAL_POLE_DEC - 90.0) * RADEG, 0)
        * rotmt(-(GAL_POLE_RA + 90.0) * RADEG, 2)
});

/// ICRS → ecliptic component rotation (x-axis tilt by the mean obliquity).
static EQU_TO_ECL: LazyLock<Matrix3<f64>> = LazyLock::new(|| rotmt(-obliquity_j2000(), 0));

/// Longitude/latitude of a unit vector, in degrees.
///
/// The z component is clamped before `asin` so positions that land exactly on
/// a pole survive floating-point rounding.
fn vector_to_lonlat(v: Vector3<f64>) -> (Degree, Degree) {
    let lat = v.z.clamp(-1.0, 1.0).asin();
    let lon = v.y.atan2(v.x);
    let lon = if lon < 0.0 { lon + DPI } else { lon };
    (lon / RADEG, lat / RADEG)
}
