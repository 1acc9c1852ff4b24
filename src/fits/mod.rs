//! # FITS container format
//!
//! Just enough FITS to serve this crate's two needs: reading HEALPix masks
//! and user-supplied catalog tables, and writing match tables next to their
//! CSV twins. Files are sequences of 2880-byte blocks; each HDU is a header
//! of 80-byte cards followed by an optional data area.
//!
//! Supported data areas are binary tables ([`bintable::BinTable`]). Other
//! HDU kinds are walked over using the standard size formula so a leading
//! image extension never derails the scan for the table HDU.

pub mod bintable;
pub mod header;

use std::fs::File;
use std::io::{Read, Write};

use camino::Utf8Path;

pub use bintable::{BinTable, ColumnData, TableColumn};
pub use header::{Card, CardValue, Header};

use crate::skymatch_errors::SkymatchError;

/// Size of one FITS block in bytes.
pub const BLOCK_LEN: usize = 2880;

/// Cards per block.
const CARDS_PER_BLOCK: usize = BLOCK_LEN / header::CARD_LEN;

/// One header-data unit.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub header: Header,
    /// Raw data area, block padding stripped to the size the header declares.
    pub data: Vec<u8>,
}

impl Hdu {
    /// Decode this HDU as a binary table, if that is what it is.
    pub fn as_bintable(&self) -> Option<Result<BinTable, SkymatchError>> {
        if self.header.get_string("XTENSION").map(str::trim) == Some("BINTABLE") {
            Some(BinTable::from_hdu(&self.header, &self.data))
        } else {
            None
        }
    }
}

/// Read every HDU of a FITS file.
pub fn read_fits(path: &Utf8Path) -> Result<Vec<Hdu>, SkymatchError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    parse_fits(&bytes)
}

/// Parse an in-memory FITS byte stream into HDUs.
pub fn parse_fits(bytes: &[u8]) -> Result<Vec<Hdu>, SkymatchError> {
    if bytes.len() < BLOCK_LEN || !bytes.starts_with(b"SIMPLE") {
        return Err(SkymatchError::InvalidFits(
            "not a FITS file: missing SIMPLE block".into(),
        ));
    }

    let mut hdus = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let (hdu, next) = parse_hdu(bytes, pos)?;
        hdus.push(hdu);
        pos = next;
    }
    Ok(hdus)
}

/// Parse one HDU starting at a block boundary; returns it and the offset of
/// the next HDU.
fn parse_hdu(bytes: &[u8], start: usize) -> Result<(Hdu, usize), SkymatchError> {
    let mut head = Header::new();
    let mut pos = start;
    let mut ended = false;

    'blocks: while !ended {
        let block = bytes.get(pos..pos + BLOCK_LEN).ok_or_else(|| {
            SkymatchError::InvalidFits("truncated header: no END card before EOF".into())
        })?;
        pos += BLOCK_LEN;
        for i in 0..CARDS_PER_BLOCK {
            let raw = &block[i * header::CARD_LEN..(i + 1) * header::CARD_LEN];
            match header::parse_card(raw)? {
                Some(card) => head.push(card),
                None => {
                    ended = true;
                    continue 'blocks;
                }
            }
        }
    }

    let data_len = data_size(&head)?;
    let padded = data_len.div_ceil(BLOCK_LEN) * BLOCK_LEN;
    let data = bytes
        .get(pos..pos + data_len)
        .ok_or_else(|| SkymatchError::InvalidFits("truncated data area".into()))?
        .to_vec();

    Ok((Hdu { header: head, data }, pos + padded))
}

/// Data area size in bytes: `|BITPIX| / 8 * GCOUNT * (PCOUNT + prod NAXISn)`.
fn data_size(header: &Header) -> Result<usize, SkymatchError> {
    let too_large = || SkymatchError::InvalidFits("data area size overflows".into());

    let bitpix = header.require_integer("BITPIX")?.unsigned_abs() as usize;
    let naxis = header.require_usize("NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }
    let mut elems = 1usize;
    for n in 1..=naxis {
        let axis = header.require_usize(&format!("NAXIS{n}"))?;
        elems = elems.checked_mul(axis).ok_or_else(too_large)?;
    }
    let pcount = header.require_usize("PCOUNT").unwrap_or(0);
    let gcount = header.require_usize("GCOUNT").unwrap_or(1);
    (bitpix / 8)
        .checked_mul(gcount)
        .and_then(|v| v.checked_mul(pcount.checked_add(elems)?))
        .ok_or_else(too_large)
}

/// First binary table of a file, the HDU both masks and catalog tables
/// conventionally live in.
pub fn first_bintable(hdus: &[Hdu]) -> Result<(&Header, BinTable), SkymatchError> {
    for hdu in hdus {
        if let Some(table) = hdu.as_bintable() {
            return Ok((&hdu.header, table?));
        }
    }
    Err(SkymatchError::InvalidFits(
        "no binary table HDU found".into(),
    ))
}

/// Serialize a minimal primary HDU plus one binary table to a writer.
///
/// Arguments
/// ---------
/// * `out`: destination stream.
/// * `columns`: equal-length table columns.
/// * `extra_cards`: cards appended to the table header, e.g. map metadata.
pub fn write_table<W: Write>(
    out: &mut W,
    columns: &[TableColumn],
    extra_cards: &[Card],
) -> Result<(), SkymatchError> {
    let mut primary = Header::new();
    primary.push(Card::logical("SIMPLE", true).with_comment("conforms to FITS standard"));
    primary.push(Card::integer("BITPIX", 8));
    primary.push(Card::integer("NAXIS", 0));
    primary.push(Card::logical("EXTEND", true));
    write_header(out, &primary)?;

    let (table_header, rows) = bintable::encode_table(columns, extra_cards)?;
    write_header(out, &table_header)?;

    out.write_all(&rows)?;
    let pad = rows.len().div_ceil(BLOCK_LEN) * BLOCK_LEN - rows.len();
    out.write_all(&vec![0u8; pad])?;
    Ok(())
}

/// Write a FITS table straight to a file path.
pub fn write_table_file(
    path: &Utf8Path,
    columns: &[TableColumn],
    extra_cards: &[Card],
) -> Result<(), SkymatchError> {
    let mut file = File::create(path)?;
    write_table(&mut file, columns, extra_cards)?;
    file.flush()?;
    Ok(())
}

/// Render a header, END card included, padded with blanks to a block
/// boundary.
fn write_header<W: Write>(out: &mut W, head: &Header) -> Result<(), SkymatchError> {
    let mut bytes = Vec::with_capacity(BLOCK_LEN);
    for card in head.cards() {
        bytes.extend_from_slice(&header::format_card(card));
    }
    bytes.extend_from_slice(&header::format_end());
    while bytes.len() % BLOCK_LEN != 0 {
        bytes.push(b' ');
    }
    out.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod fits_test {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let columns = vec![
            TableColumn::float("RA", vec![242.75, 59.1, 0.0]),
            TableColumn::float("Dec", vec![54.98, -49.32, 90.0]),
            TableColumn::text(
                "catalog",
                vec!["abell".into(), "abell".into(), "abell".into()],
            ),
        ];
        let mut buf = Vec::new();
        write_table(&mut buf, &columns, &[Card::integer("NSIDE", 8)]).unwrap();
        assert_eq!(buf.len() % BLOCK_LEN, 0);

        let hdus = parse_fits(&buf).unwrap();
        assert_eq!(hdus.len(), 2);
        assert!(hdus[0].data.is_empty());

        let (head, table) = first_bintable(&hdus).unwrap();
        assert_eq!(head.get_integer("NSIDE"), Some(8));
        assert_eq!(table.nrows(), 3);
        assert_eq!(
            table.number_column_flat(0).unwrap(),
            vec![242.75, 59.1, 0.0]
        );
        assert_eq!(table.cell_string(2, 2).unwrap(), "abell");
    }

    #[test]
    fn test_primary_image_is_skipped() {
        // Primary HDU with a small image, then the table
        let mut primary = Header::new();
        primary.push(Card::logical("SIMPLE", true));
        primary.push(Card::integer("BITPIX", -32));
        primary.push(Card::integer("NAXIS", 2));
        primary.push(Card::integer("NAXIS1", 10));
        primary.push(Card::integer("NAXIS2", 5));

        let mut buf = Vec::new();
        write_header(&mut buf, &primary).unwrap();
        buf.extend_from_slice(&vec![0u8; 200]);
        while buf.len() % BLOCK_LEN != 0 {
            buf.push(0);
        }

        let (table_header, rows) =
            bintable::encode_table(&[TableColumn::float("x", vec![1.5])], &[]).unwrap();
        write_header(&mut buf, &table_header).unwrap();
        buf.extend_from_slice(&rows);
        while buf.len() % BLOCK_LEN != 0 {
            buf.push(0);
        }

        let hdus = parse_fits(&buf).unwrap();
        assert_eq!(hdus.len(), 2);
        assert_eq!(hdus[0].data.len(), 200);
        let (_, table) = first_bintable(&hdus).unwrap();
        assert_eq!(table.number_column_flat(0).unwrap(), vec![1.5]);
    }

    #[test]
    fn test_not_a_fits_file() {
        assert!(parse_fits(b"RA,Dec\n1.0,2.0\n").is_err());
        assert!(parse_fits(&[]).is_err());
    }

    #[test]
    fn test_truncated_header_rejected() {
        // A full block of cards with the END card missing
        let mut buf = Vec::new();
        buf.extend_from_slice(&header::format_card(&Card::logical("SIMPLE", true)));
        while buf.len() < BLOCK_LEN {
            buf.extend_from_slice(&header::format_card(&Card {
                keyword: "COMMENT".into(),
                value: CardValue::None,
                comment: Some("filler".into()),
            }));
        }
        assert!(matches!(
            parse_fits(&buf),
            Err(SkymatchError::InvalidFits(_))
        ));
    }

    #[test]
    fn test_no_bintable_err() {
        let mut primary = Header::new();
        primary.push(Card::logical("SIMPLE", true));
        primary.push(Card::integer("BITPIX", 8));
        primary.push(Card::integer("NAXIS", 0));
        let mut buf = Vec::new();
        write_header(&mut buf, &primary).unwrap();
        let hdus = parse_fits(&buf).unwrap();
        assert!(matches!(
            first_bintable(&hdus),
            Err(SkymatchError::InvalidFits(_))
        ));
    }
}
