use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkymatchError {
    #[error("Invalid sky position: ra={ra}, dec={dec} (RA/Dec must be finite, Dec in [-90, 90])")]
    InvalidPosition { ra: f64, dec: f64 },

    #[error("Malformed HEALPix mask: {0}")]
    MalformedMask(String),

    #[error("Row cannot be normalized: {0}")]
    UnmappableRow(String),

    #[error("Catalog service transport error: {0}")]
    Transport(#[from] ureq::Error),

    #[error("Unknown survey '{0}'. Choose from: hlwas, hltds, gbtds")]
    UnknownSurvey(String),

    #[error("Unknown catalog '{0}'. Choose from: abell, sdss, 2masx, ngc, ned, custom")]
    UnknownCatalog(String),

    #[error("Invalid FITS structure: {0}")]
    InvalidFits(String),

    #[error("Invalid row limit: {0} (must be positive)")]
    InvalidRowLimit(usize),

    #[error("Catalog 'custom' requested but no custom catalog file is configured")]
    MissingCustomFile,

    #[error("Custom catalog file not found: {0}")]
    CustomFileNotFound(String),

    #[error("Columns '{ra_col}' / '{dec_col}' not found in custom file. Available columns: {available}")]
    CustomColumnsNotFound {
        ra_col: String,
        dec_col: String,
        available: String,
    },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for SkymatchError {
    fn eq(&self, other: &Self) -> bool {
        use SkymatchError::*;
        match (self, other) {
            (InvalidPosition { ra: a, dec: b }, InvalidPosition { ra: c, dec: d }) => {
                (a == c || (a.is_nan() && c.is_nan())) && (b == d || (b.is_nan() && d.is_nan()))
            }
            (MalformedMask(a), MalformedMask(b)) => a == b,
            (UnmappableRow(a), UnmappableRow(b)) => a == b,
            (UnknownSurvey(a), UnknownSurvey(b)) => a == b,
            (UnknownCatalog(a), UnknownCatalog(b)) => a == b,
            (InvalidFits(a), InvalidFits(b)) => a == b,
            (InvalidRowLimit(a), InvalidRowLimit(b)) => a == b,
            (CustomFileNotFound(a), CustomFileNotFound(b)) => a == b,
            (
                CustomColumnsNotFound {
                    ra_col: a,
                    dec_col: b,
                    available: c,
                },
                CustomColumnsNotFound {
                    ra_col: d,
                    dec_col: e,
                    available: f,
                },
            ) => a == d && b == e && c == f,

            // Wrapped sources are not comparable: equal when the variant matches
            (Transport(_), Transport(_)) => true,
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (MissingCustomFile, MissingCustomFile) => true,

            _ => false,
        }
    }
}
