//! Loading user-supplied catalogs from local FITS or CSV files.
//!
//! The file format follows the extension when it is recognizable and the
//! file content otherwise: anything starting with the FITS magic is read as
//! a binary table, everything else as CSV. The caller names the coordinate
//! columns; their absence is reported together with the columns the file
//! actually has.

use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use log::info;

use crate::catalogs::RawTable;
use crate::fits;
use crate::skymatch_errors::SkymatchError;

enum FileKind {
    Fits,
    Csv,
    Unknown,
}

fn extension_kind(path: &Utf8Path) -> FileKind {
    match path.extension().map(str::to_ascii_lowercase).as_deref() {
        Some("fits") | Some("fit") => FileKind::Fits,
        Some("csv") => FileKind::Csv,
        _ => FileKind::Unknown,
    }
}

fn looks_like_fits(path: &Utf8Path) -> Result<bool, SkymatchError> {
    let mut magic = [0u8; 6];
    let mut file = File::open(path)?;
    let n = file.read(&mut magic)?;
    Ok(n == magic.len() && &magic == b"SIMPLE")
}

/// Load a user catalog and check that the named coordinate columns exist.
///
/// Arguments
/// ---------
/// * `path`: the catalog file, FITS or CSV
/// * `ra_col`: name of the right ascension column
/// * `dec_col`: name of the declination column
///
/// Return
/// ------
/// * The file contents as a raw table, every cell rendered as text,
///   or the error describing why the file is unusable.
pub fn load_custom(
    path: &Utf8Path,
    ra_col: &str,
    dec_col: &str,
) -> Result<RawTable, SkymatchError> {
    if path.as_str().is_empty() {
        return Err(SkymatchError::MissingCustomFile);
    }
    if !path.exists() {
        return Err(SkymatchError::CustomFileNotFound(path.to_string()));
    }
    info!("loading custom catalog from {path}");

    let table = match extension_kind(path) {
        FileKind::Fits => read_fits_table(path)?,
        FileKind::Csv => read_csv_table(path)?,
        FileKind::Unknown => {
            if looks_like_fits(path)? {
                read_fits_table(path)?
            } else {
                read_csv_table(path)?
            }
        }
    };

    if table.column_index(ra_col).is_none() || table.column_index(dec_col).is_none() {
        return Err(SkymatchError::CustomColumnsNotFound {
            ra_col: ra_col.to_string(),
            dec_col: dec_col.to_string(),
            available: table.columns.join(", "),
        });
    }
    Ok(table)
}

/// Read the first binary table of a FITS file, scalar columns only.
fn read_fits_table(path: &Utf8Path) -> Result<RawTable, SkymatchError> {
    let hdus = fits::read_fits(path)?;
    let (_, bintable) = fits::first_bintable(&hdus)?;

    let keep: Vec<usize> = bintable
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_scalar())
        .map(|(i, _)| i)
        .collect();
    let names = keep
        .iter()
        .map(|&i| bintable.columns()[i].name.trim().to_string())
        .collect();

    let mut table = RawTable::new(names);
    for row in 0..bintable.nrows() {
        let mut cells = Vec::with_capacity(keep.len());
        for &col in &keep {
            cells.push(bintable.cell_string(row, col)?);
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn read_csv_table(path: &Utf8Path) -> Result<RawTable, SkymatchError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(table)
}
