//! # HEALPix pixelization
//!
//! Minimal HEALPix support for membership tests against pixel masks: the
//! `ang2pix` transform in both the RING and NESTED numbering schemes, plus
//! the `nside`/`npix` bookkeeping helpers the mask loader relies on.
//!
//! Only the sphere-to-pixel direction is implemented. Masks are dense pixel
//! vectors, so lookups never need the inverse transform or neighbour queries.
//!
//! The arithmetic follows the reference HEALPix pixelization (Górski et al.
//! 2005): the sphere is split at `|z| = 2/3` into an equatorial belt of
//! iso-latitude rings and two polar caps, and each branch computes the ring
//! index and the pixel-in-ring index from the longitude scaled to `[0, 4)`.

use std::str::FromStr;

use crate::constants::RADEG;
use crate::ref_frames::SkyPosition;
use crate::skymatch_errors::SkymatchError;

/// Largest supported `nside`; keeps `12 * nside^2` within `u64`.
pub const NSIDE_MAX: u32 = 1 << 29;

/// Pixel numbering scheme of a HEALPix map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Pixels numbered along iso-latitude rings, north to south.
    Ring,
    /// Pixels numbered by nested quad-tree subdivision of the 12 base faces.
    Nested,
}

impl FromStr for Ordering {
    type Err = SkymatchError;

    /// Parse the FITS `ORDERING` keyword value (`RING`, `NESTED`, or `NEST`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "RING" => Ok(Ordering::Ring),
            "NESTED" | "NEST" => Ok(Ordering::Nested),
            other => Err(SkymatchError::MalformedMask(format!(
                "unknown ORDERING value: {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Ordering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ordering::Ring => write!(f, "RING"),
            Ordering::Nested => write!(f, "NESTED"),
        }
    }
}

/// Number of pixels of a map with the given resolution.
pub fn nside2npix(nside: u32) -> u64 {
    12 * (nside as u64) * (nside as u64)
}

/// Resolution of a map with the given pixel count.
///
/// Return
/// ------
/// * `Some(nside)` when `npix = 12 * nside^2` for a power-of-two `nside`,
///   `None` otherwise.
pub fn npix2nside(npix: u64) -> Option<u32> {
    if npix == 0 || npix % 12 != 0 {
        return None;
    }
    let nside = ((npix / 12) as f64).sqrt().round() as u64;
    if nside * nside * 12 == npix && nside.is_power_of_two() && nside <= NSIDE_MAX as u64 {
        Some(nside as u32)
    } else {
        None
    }
}

/// Pixel index of a sky position.
///
/// Arguments
/// ---------
/// * `ordering`: numbering scheme of the target map.
/// * `nside`: map resolution, a power of two in `[1, 2^29]`.
/// * `pos`: the position to pixelize.
///
/// Return
/// ------
/// * The pixel index, in `[0, 12 * nside^2)`.
///
/// Panics
/// ------
/// * If `nside` is zero, above [`NSIDE_MAX`], or not a power of two. The
///   mask loader validates resolutions before any lookup reaches this point.
pub fn ang2pix(ordering: Ordering, nside: u32, pos: &SkyPosition) -> u64 {
    if nside == 0 || nside > NSIDE_MAX || !nside.is_power_of_two() {
        panic!("**** ANG2PIX: invalid nside {nside} ****");
    }

    // z = cos(colatitude) = sin(dec); longitude scaled so one base face = 1
    let z = (pos.dec() * RADEG).sin();
    let tt = (pos.ra() / 90.0).rem_euclid(4.0);

    match ordering {
        Ordering::Ring => ang2pix_ring(nside as i64, z, tt),
        Ordering::Nested => ang2pix_nest(nside as i64, z, tt),
    }
}

fn ang2pix_ring(nside: i64, z: f64, tt: f64) -> u64 {
    let za = z.abs();

    if za <= 2.0 / 3.0 {
        // Equatorial belt
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64; // ascending edge line index
        let jm = (temp1 + temp2) as i64; // descending edge line index

        // ring number counted from z = 2/3, in [1, 2*nside + 1]
        let ir = nside + 1 + jp - jm;
        let kshift = 1 - (ir & 1);

        let ip = ((jp + jm - nside + kshift + 1) / 2).rem_euclid(4 * nside);

        (2 * nside * (nside - 1) + (ir - 1) * 4 * nside + ip) as u64
    } else {
        // Polar caps
        let tp = tt.fract();
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();

        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;

        // ring number counted from the closest pole
        let ir = jp + jm + 1;
        let ip = ((tt * ir as f64) as i64).rem_euclid(4 * ir);

        if z > 0.0 {
            (2 * ir * (ir - 1) + ip) as u64
        } else {
            (12 * nside * nside - 2 * ir * (ir + 1) + ip) as u64
        }
    }
}

fn ang2pix_nest(nside: i64, z: f64, tt: f64) -> u64 {
    let za = z.abs();

    let (face, ix, iy) = if za <= 2.0 / 3.0 {
        // Equatorial belt
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp / nside; // in [0, 4]
        let ifm = jm / nside;

        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };

        let ix = jm & (nside - 1);
        let iy = nside - (jp & (nside - 1)) - 1;
        (face, ix, iy)
    } else {
        // Polar caps
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();

        // clamp for points right on a face boundary
        let jp = ((tp * tmp) as i64).min(nside - 1);
        let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);

        if z >= 0.0 {
            (ntt, nside - jm - 1, nside - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    let npface = (nside * nside) as u64;
    face as u64 * npface + spread_bits(ix as u64) + (spread_bits(iy as u64) << 1)
}

/// Spread the low 32 bits of `v` into the even bit positions.
fn spread_bits(v: u64) -> u64 {
    let mut v = v & 0x0000_0000_ffff_ffff;
    v = (v | (v << 16)) & 0x0000_ffff_0000_ffff;
    v = (v | (v << 8)) & 0x00ff_00ff_00ff_00ff;
    v = (v | (v << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}
