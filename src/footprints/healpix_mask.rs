//! HEALPix pixel masks loaded from FITS files.
//!
//! A mask is a dense boolean map: pixel values greater than zero are inside
//! the footprint, everything else (zero, negative sentinels such as
//! `UNSEEN`, NaN) is outside. Both RING and NESTED numbering are honored at
//! lookup, following the map's own `ORDERING` keyword.
//!
//! Every structural defect is reported as
//! [`SkymatchError::MalformedMask`] at load time. A mask that loaded
//! successfully can never fail a membership test afterwards.

use camino::Utf8Path;
use log::debug;

use crate::fits;
use crate::healpix::{ang2pix, nside2npix, Ordering, NSIDE_MAX};
use crate::ref_frames::SkyPosition;
use crate::skymatch_errors::SkymatchError;

/// A validated HEALPix coverage mask.
#[derive(Debug, Clone)]
pub struct HealpixMask {
    nside: u32,
    ordering: Ordering,
    pixels: Vec<bool>,
}

impl HealpixMask {
    /// Load a mask from a FITS file.
    ///
    /// The map must live in a binary table HDU whose header carries `NSIDE`
    /// (a power of two) and `ORDERING` (`RING` or `NESTED`), with implicit
    /// pixel indexing and exactly `12 * nside^2` values in its first column.
    ///
    /// Return
    /// ------
    /// * The mask, or [`SkymatchError::MalformedMask`] describing the first
    ///   defect found. Defects are never demoted to an all-false mask.
    pub fn load(path: &Utf8Path) -> Result<HealpixMask, SkymatchError> {
        let fail = |cause: String| SkymatchError::MalformedMask(format!("{path}: {cause}"));

        let hdus = fits::read_fits(path).map_err(|e| fail(e.to_string()))?;
        let (header, table) = fits::first_bintable(&hdus).map_err(|e| fail(e.to_string()))?;

        if let Some(schm) = header.get_string("INDXSCHM") {
            if schm != "IMPLICIT" {
                return Err(fail(format!(
                    "unsupported pixel indexing {schm:?}, only IMPLICIT maps are understood"
                )));
            }
        }

        let nside_raw = header
            .get_integer("NSIDE")
            .ok_or_else(|| fail("missing NSIDE keyword".into()))?;
        let nside = u32::try_from(nside_raw)
            .ok()
            .filter(|n| (1..=NSIDE_MAX).contains(n) && n.is_power_of_two())
            .ok_or_else(|| fail(format!("NSIDE {nside_raw} is not a valid resolution")))?;

        let ordering: Ordering = header
            .get_string("ORDERING")
            .ok_or_else(|| fail("missing ORDERING keyword".into()))?
            .parse()
            .map_err(|e: SkymatchError| fail(e.to_string()))?;

        if table.columns().is_empty() {
            return Err(fail("map table has no columns".into()));
        }
        let values = table
            .number_column_flat(0)
            .map_err(|e| fail(e.to_string()))?;

        let npix = nside2npix(nside);
        if values.len() as u64 != npix {
            return Err(fail(format!(
                "pixel count {} does not match NSIDE {nside} (expected {npix})",
                values.len()
            )));
        }

        let pixels: Vec<bool> = values.iter().map(|v| *v > 0.0).collect();
        let active = pixels.iter().filter(|p| **p).count();
        debug!(
            "loaded mask {path}: nside={nside}, ordering={ordering}, {active}/{npix} pixels active"
        );

        Ok(HealpixMask {
            nside,
            ordering,
            pixels,
        })
    }

    /// Whether the position falls on an active pixel.
    pub fn contains(&self, pos: &SkyPosition) -> bool {
        let pix = ang2pix(self.ordering, self.nside, pos);
        self.pixels[pix as usize]
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Number of pixels inside the footprint.
    pub fn active_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

#[cfg(test)]
mod healpix_mask_test {
    use super::*;

    use camino::Utf8PathBuf;

    use crate::fits::{Card, TableColumn};

    fn write_mask(
        dir: &Utf8Path,
        name: &str,
        nside: i64,
        ordering: &str,
        values: Vec<f64>,
    ) -> Utf8PathBuf {
        let path = dir.join(name);
        let cards = vec![
            Card::string("PIXTYPE", "HEALPIX"),
            Card::string("ORDERING", ordering),
            Card::integer("NSIDE", nside),
            Card::string("INDXSCHM", "IMPLICIT"),
        ];
        fits::write_table_file(&path, &[TableColumn::float("SIGNAL", values)], &cards).unwrap();
        path
    }

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn pos(ra: f64, dec: f64) -> SkyPosition {
        SkyPosition::new(ra, dec).unwrap()
    }

    #[test]
    fn test_ring_mask_lookup() {
        let (_guard, dir) = tempdir();
        // nside = 1: the equator point (0, 0) lands in ring pixel 4
        let mut values = vec![0.0; 12];
        values[4] = 1.0;
        let path = write_mask(&dir, "ring.fits", 1, "RING", values);

        let mask = HealpixMask::load(&path).unwrap();
        assert_eq!(mask.nside(), 1);
        assert_eq!(mask.ordering(), Ordering::Ring);
        assert_eq!(mask.active_pixels(), 1);
        assert!(mask.contains(&pos(0.0, 0.0)));
        assert!(!mask.contains(&pos(0.0, 90.0)));
        assert!(!mask.contains(&pos(180.0, 0.0)));
    }

    #[test]
    fn test_ordering_keyword_is_honored() {
        let (_guard, dir) = tempdir();
        // At nside = 2 the point (45, 0) is ring pixel 21 but nested pixel 22
        let mut values = vec![0.0; 48];
        values[22] = 1.0;

        let nested = write_mask(&dir, "nest.fits", 2, "NESTED", values.clone());
        let mask = HealpixMask::load(&nested).unwrap();
        assert!(mask.contains(&pos(45.0, 0.0)));

        let ring = write_mask(&dir, "ring.fits", 2, "RING", values);
        let mask = HealpixMask::load(&ring).unwrap();
        assert!(!mask.contains(&pos(45.0, 0.0)));
    }

    #[test]
    fn test_sentinel_values_are_outside() {
        let (_guard, dir) = tempdir();
        let mut values = vec![-1.6375e30; 12];
        values[0] = 0.0;
        values[1] = 0.5;
        values[2] = f64::NAN;
        let path = write_mask(&dir, "sentinel.fits", 1, "RING", values);

        let mask = HealpixMask::load(&path).unwrap();
        assert_eq!(mask.active_pixels(), 1);
    }

    #[test]
    fn test_pixel_count_mismatch() {
        let (_guard, dir) = tempdir();
        let path = write_mask(&dir, "short.fits", 1, "RING", vec![1.0; 11]);
        assert!(matches!(
            HealpixMask::load(&path),
            Err(SkymatchError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_invalid_nside() {
        let (_guard, dir) = tempdir();
        let path = write_mask(&dir, "odd.fits", 3, "RING", vec![1.0; 108]);
        assert!(matches!(
            HealpixMask::load(&path),
            Err(SkymatchError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_missing_nside_keyword() {
        let (_guard, dir) = tempdir();
        let path = dir.join("nokey.fits");
        fits::write_table_file(
            &path,
            &[TableColumn::float("SIGNAL", vec![1.0; 12])],
            &[Card::string("ORDERING", "RING")],
        )
        .unwrap();
        let err = HealpixMask::load(&path).unwrap_err();
        assert!(err.to_string().contains("NSIDE"));
    }

    #[test]
    fn test_unknown_ordering() {
        let (_guard, dir) = tempdir();
        let path = write_mask(&dir, "badord.fits", 1, "SPIRAL", vec![1.0; 12]);
        assert!(matches!(
            HealpixMask::load(&path),
            Err(SkymatchError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_explicit_indexing_rejected() {
        let (_guard, dir) = tempdir();
        let path = dir.join("partial.fits");
        let cards = vec![
            Card::string("ORDERING", "RING"),
            Card::integer("NSIDE", 1),
            Card::string("INDXSCHM", "EXPLICIT"),
        ];
        fits::write_table_file(&path, &[TableColumn::float("PIXEL", vec![4.0])], &cards).unwrap();
        assert!(matches!(
            HealpixMask::load(&path),
            Err(SkymatchError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_not_a_fits_file() {
        let (_guard, dir) = tempdir();
        let path = dir.join("mask.csv");
        std::fs::write(&path, "pixel,value\n0,1\n").unwrap();
        assert!(matches!(
            HealpixMask::load(&path),
            Err(SkymatchError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let (_guard, dir) = tempdir();
        assert!(matches!(
            HealpixMask::load(&dir.join("absent.fits")),
            Err(SkymatchError::MalformedMask(_))
        ));
    }
}
